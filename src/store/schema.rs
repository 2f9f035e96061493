pub const SCHEMA: &str = r#"
-- Accounts own sites. Admin is a role on the account, not a separate
-- credential store.
CREATE TABLE IF NOT EXISTS accounts (
    id TEXT PRIMARY KEY,
    username TEXT NOT NULL UNIQUE,
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,       -- argon2id hash with embedded salt
    role TEXT NOT NULL DEFAULT 'user',
    plan TEXT NOT NULL DEFAULT 'free',
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

-- Sites. The UNIQUE constraint on subdomain is the subdomain registry:
-- inserting the row reserves the name, a constraint violation is a
-- conflict. Uniqueness holds across active and inactive sites.
CREATE TABLE IF NOT EXISTS sites (
    id TEXT PRIMARY KEY,
    account_id TEXT NOT NULL REFERENCES accounts(id),
    name TEXT NOT NULL,
    subdomain TEXT NOT NULL UNIQUE,

    -- Settings
    password_protection INTEGER NOT NULL DEFAULT 0,
    analytics INTEGER NOT NULL DEFAULT 1,
    indexing INTEGER NOT NULL DEFAULT 1,

    -- Stats
    visits INTEGER NOT NULL DEFAULT 0,
    bandwidth_bytes INTEGER NOT NULL DEFAULT 0,
    storage_bytes INTEGER NOT NULL DEFAULT 0,
    last_deployed_at TEXT,

    active INTEGER NOT NULL DEFAULT 1,
    build_status TEXT NOT NULL DEFAULT 'success',

    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

-- Custom domains. A domain string maps to at most one site system-wide.
CREATE TABLE IF NOT EXISTS custom_domains (
    site_id TEXT NOT NULL REFERENCES sites(id) ON DELETE CASCADE,
    domain TEXT NOT NULL UNIQUE,
    verified INTEGER NOT NULL DEFAULT 0,
    ssl_enabled INTEGER NOT NULL DEFAULT 0,
    dns_a TEXT NOT NULL DEFAULT '[]',      -- JSON arrays
    dns_cname TEXT NOT NULL DEFAULT '[]',
    dns_txt TEXT NOT NULL DEFAULT '[]',
    created_at TEXT DEFAULT (datetime('now')),
    PRIMARY KEY (site_id, domain)
);

-- Tokens are auth credentials bound to an account
CREATE TABLE IF NOT EXISTS tokens (
    id TEXT PRIMARY KEY,
    token_hash TEXT NOT NULL,          -- argon2id hash with embedded salt
    token_lookup TEXT NOT NULL,        -- first 8 chars of ID for fast lookup
    account_id TEXT NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
    created_at TEXT DEFAULT (datetime('now')),
    expires_at TEXT,            -- NULL = never
    last_used_at TEXT
);

-- Create indexes
CREATE INDEX IF NOT EXISTS idx_sites_account ON sites(account_id);
CREATE INDEX IF NOT EXISTS idx_sites_subdomain ON sites(subdomain);
CREATE INDEX IF NOT EXISTS idx_custom_domains_site ON custom_domains(site_id);
CREATE UNIQUE INDEX IF NOT EXISTS idx_tokens_lookup ON tokens(token_lookup);
CREATE INDEX IF NOT EXISTS idx_tokens_account ON tokens(account_id);
"#;
