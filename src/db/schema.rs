//! Database schema and migrations for feedcourier.
//!
//! Migrations are applied sequentially when the database is opened. The
//! `schema_version` table tracks which migrations have been applied.
//! Timestamps are stored as RFC 3339 text on both backends.

/// Database migrations.
#[cfg(feature = "sqlite")]
pub const MIGRATIONS: &[&str] = &[
    // v1: sources, articles and reactions
    r#"
-- Feed sources, one row per configured name
CREATE TABLE sources (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    name            TEXT NOT NULL UNIQUE,
    last_fetched_at TEXT,                    -- watermark, NULL until first cycle
    created_at      TEXT NOT NULL
);

-- Articles extracted from feed items
CREATE TABLE articles (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    source_id       INTEGER NOT NULL REFERENCES sources(id),
    url             TEXT NOT NULL,
    title           TEXT NOT NULL,
    text_content    TEXT NOT NULL,
    excerpt         TEXT NOT NULL,
    language        TEXT NOT NULL,
    published_at    TEXT NOT NULL,
    created_at      TEXT NOT NULL
);

CREATE INDEX idx_articles_source_id ON articles(source_id);
CREATE INDEX idx_articles_url ON articles(url);

-- Feedback from notification recipients
CREATE TABLE reactions (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    article_id      INTEGER NOT NULL REFERENCES articles(id),
    kind            TEXT NOT NULL CHECK (kind IN ('like', 'dislike')),
    created_at      TEXT NOT NULL
);

CREATE INDEX idx_reactions_article_id ON reactions(article_id);
"#,
];

/// Database migrations.
#[cfg(feature = "postgres")]
pub const MIGRATIONS: &[&str] = &[
    // v1: sources, articles and reactions
    r#"
CREATE TABLE sources (
    id              BIGSERIAL PRIMARY KEY,
    name            TEXT NOT NULL UNIQUE,
    last_fetched_at TEXT,
    created_at      TEXT NOT NULL
);

CREATE TABLE articles (
    id              BIGSERIAL PRIMARY KEY,
    source_id       BIGINT NOT NULL REFERENCES sources(id),
    url             TEXT NOT NULL,
    title           TEXT NOT NULL,
    text_content    TEXT NOT NULL,
    excerpt         TEXT NOT NULL,
    language        TEXT NOT NULL,
    published_at    TEXT NOT NULL,
    created_at      TEXT NOT NULL
);

CREATE INDEX idx_articles_source_id ON articles(source_id);
CREATE INDEX idx_articles_url ON articles(url);

CREATE TABLE reactions (
    id              BIGSERIAL PRIMARY KEY,
    article_id      BIGINT NOT NULL REFERENCES articles(id),
    kind            TEXT NOT NULL CHECK (kind IN ('like', 'dislike')),
    created_at      TEXT NOT NULL
);

CREATE INDEX idx_reactions_article_id ON reactions(article_id);
"#,
];
