//! SQL schema for the keyword store.
//!
//! Executed once at connection startup. Reserved keyword rows are seeded
//! separately by the store so their text comes from `recs_core::keyword`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Ids are assigned by the producing services, never generated here.
CREATE TABLE IF NOT EXISTS users (
    user_id     INTEGER PRIMARY KEY CHECK (user_id > 0)
);

CREATE TABLE IF NOT EXISTS products (
    product_id  INTEGER PRIMARY KEY CHECK (product_id > 0)
);

-- Global keyword dictionary; the same text always maps to the same id.
CREATE TABLE IF NOT EXISTS keywords (
    keyword_id  INTEGER PRIMARY KEY AUTOINCREMENT,
    text        TEXT    NOT NULL UNIQUE,
    reserved    INTEGER NOT NULL DEFAULT 0   -- 1 = never used for matching
);

CREATE TABLE IF NOT EXISTS user_keywords (
    user_id     INTEGER NOT NULL REFERENCES users(user_id),
    keyword_id  INTEGER NOT NULL REFERENCES keywords(keyword_id),
    PRIMARY KEY (user_id, keyword_id)
);

CREATE TABLE IF NOT EXISTS product_keywords (
    product_id  INTEGER NOT NULL REFERENCES products(product_id),
    keyword_id  INTEGER NOT NULL REFERENCES keywords(keyword_id),
    PRIMARY KEY (product_id, keyword_id)
);

CREATE INDEX IF NOT EXISTS product_keywords_keyword_idx ON product_keywords(keyword_id);

PRAGMA user_version = 1;
";

/// Seeds (or re-flags) one reserved keyword row.
pub const SEED_RESERVED: &str = "
INSERT INTO keywords (text, reserved) VALUES (?1, 1)
ON CONFLICT (text) DO UPDATE SET reserved = 1
";
