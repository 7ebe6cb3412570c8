//! Idempotent schema migrations for the Postgres-backed store: a flat list
//! of `IF NOT EXISTS` statements run once at startup.

use sqlx::PgPool;
use tracing::info;

pub async fn migrate(pool: &PgPool) -> sqlx::Result<()> {
    info!("Running schema migrations...");

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS publishers (
            id UUID PRIMARY KEY,
            domain TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            homepage_url TEXT NOT NULL,
            waf_detected BOOLEAN,
            waf_type TEXT,
            tos_url TEXT,
            tos_permissions JSONB,
            robots_found BOOLEAN,
            sitemap_urls TEXT[],
            rss_feed_urls TEXT[],
            rsl_detected BOOLEAN,
            ai_bot_blocks JSONB,
            organization_details JSONB,
            has_paywall BOOLEAN,
            fetch_strategy TEXT,
            last_checked_at TIMESTAMPTZ,
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS resolution_jobs (
            id UUID PRIMARY KEY,
            submitted_url TEXT NOT NULL,
            canonical_url TEXT NOT NULL,
            publisher_id UUID NOT NULL REFERENCES publishers(id),
            status TEXT NOT NULL,
            waf_result JSONB,
            tos_result JSONB,
            robots_result JSONB,
            ai_bot_result JSONB,
            sitemap_result JSONB,
            rss_result JSONB,
            rsl_result JSONB,
            metadata_result JSONB,
            article_result JSONB,
            error TEXT,
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS resolution_jobs_canonical_url_idx \
         ON resolution_jobs (canonical_url)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS resolution_jobs_publisher_id_idx \
         ON resolution_jobs (publisher_id)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS resolution_jobs_pending_idx \
         ON resolution_jobs (created_at) WHERE status = 'pending'",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS article_metadata (
            id UUID PRIMARY KEY,
            job_id UUID NOT NULL REFERENCES resolution_jobs(id),
            article_url TEXT NOT NULL,
            jsonld_fields JSONB,
            opengraph_fields JSONB,
            microdata_fields JSONB,
            twitter_cards JSONB,
            has_jsonld BOOLEAN NOT NULL,
            has_opengraph BOOLEAN NOT NULL,
            has_microdata BOOLEAN NOT NULL,
            has_twitter_cards BOOLEAN NOT NULL,
            paywall_status TEXT NOT NULL,
            paywall_signals TEXT[] NOT NULL,
            llm_summary TEXT,
            created_at TIMESTAMPTZ NOT NULL
        )",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS article_metadata_article_url_idx \
         ON article_metadata (article_url)",
    )
    .execute(pool)
    .await?;

    info!("Schema migrations complete");
    Ok(())
}
