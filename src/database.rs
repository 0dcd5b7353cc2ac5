// database.rs
use crate::commands::loans::{apply_repayment, LoanRecord};
use crate::commands::pancakes::{PancakeOutcome, PancakeStats};
use crate::error::Error;
use crate::skysearch::AlertSubscription;
use std::sync::Arc;
use tokio_postgres::{Client, NoTls, Row};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS skysearch_alerts (
    guild_id BIGINT PRIMARY KEY,
    channel_id BIGINT NOT NULL,
    role_id BIGINT,
    cooldown_minutes INT NOT NULL DEFAULT 5
);
CREATE TABLE IF NOT EXISTS counters (
    guild_id BIGINT NOT NULL,
    name TEXT NOT NULL,
    value BIGINT NOT NULL DEFAULT 0,
    PRIMARY KEY (guild_id, name)
);
CREATE TABLE IF NOT EXISTS loans (
    guild_id BIGINT NOT NULL,
    lender_id BIGINT NOT NULL,
    borrower_id BIGINT NOT NULL,
    amount BIGINT NOT NULL,
    PRIMARY KEY (guild_id, lender_id, borrower_id)
);
CREATE TABLE IF NOT EXISTS pancake_stats (
    user_id BIGINT PRIMARY KEY,
    flips INT NOT NULL DEFAULT 0,
    perfect INT NOT NULL DEFAULT 0,
    dropped INT NOT NULL DEFAULT 0,
    stuck INT NOT NULL DEFAULT 0,
    burnt INT NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS typowatch_settings (
    guild_id BIGINT PRIMARY KEY,
    enabled BOOLEAN NOT NULL DEFAULT FALSE
);
CREATE TABLE IF NOT EXISTS typowatch_words (
    guild_id BIGINT NOT NULL,
    typo TEXT NOT NULL,
    correction TEXT NOT NULL,
    PRIMARY KEY (guild_id, typo)
);
CREATE TABLE IF NOT EXISTS ghostping_settings (
    guild_id BIGINT PRIMARY KEY,
    enabled BOOLEAN NOT NULL DEFAULT FALSE,
    log_channel_id BIGINT
);
";

pub const DEFAULT_ALERT_COOLDOWN_MINUTES: i32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GhostPingSettings {
    pub enabled: bool,
    pub log_channel_id: Option<i64>,
}

#[derive(Clone)]
pub struct Database {
    client: Arc<Client>,
}

impl Database {
    pub async fn connect(url: &str) -> Result<Self, Error> {
        let (client, connection) = tokio_postgres::connect(url, NoTls).await?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("Database connection error: {}", e);
            }
        });

        Ok(Self { client: Arc::new(client) })
    }

    pub async fn migrate(&self) -> Result<(), Error> {
        self.client.batch_execute(SCHEMA).await?;
        Ok(())
    }

    // SkySearch alerts

    pub async fn fetch_alert_subscriptions(&self) -> Result<Vec<AlertSubscription>, Error> {
        let rows = self.client
            .query(
                "SELECT guild_id, channel_id, role_id, cooldown_minutes FROM skysearch_alerts",
                &[],
            )
            .await?;

        Ok(rows.iter().map(subscription_from_row).collect())
    }

    pub async fn fetch_alert_subscription(&self, guild_id: i64) -> Result<Option<AlertSubscription>, Error> {
        let row = self.client
            .query_opt(
                "SELECT guild_id, channel_id, role_id, cooldown_minutes FROM skysearch_alerts WHERE guild_id = $1",
                &[&guild_id],
            )
            .await?;

        Ok(row.as_ref().map(subscription_from_row))
    }

    pub async fn store_alert_channel(&self, guild_id: i64, channel_id: i64) -> Result<(), Error> {
        self.client
            .execute(
                "INSERT INTO skysearch_alerts (guild_id, channel_id, cooldown_minutes) VALUES ($1, $2, $3)
                ON CONFLICT (guild_id) DO UPDATE SET channel_id = EXCLUDED.channel_id",
                &[&guild_id, &channel_id, &DEFAULT_ALERT_COOLDOWN_MINUTES],
            )
            .await?;
        Ok(())
    }

    /// Returns false when the guild has no alert channel yet.
    pub async fn store_alert_role(&self, guild_id: i64, role_id: Option<i64>) -> Result<bool, Error> {
        let updated = self.client
            .execute(
                "UPDATE skysearch_alerts SET role_id = $2 WHERE guild_id = $1",
                &[&guild_id, &role_id],
            )
            .await?;
        Ok(updated > 0)
    }

    /// Returns false when the guild has no alert channel yet.
    pub async fn store_alert_cooldown(&self, guild_id: i64, minutes: i32) -> Result<bool, Error> {
        let updated = self.client
            .execute(
                "UPDATE skysearch_alerts SET cooldown_minutes = $2 WHERE guild_id = $1",
                &[&guild_id, &minutes],
            )
            .await?;
        Ok(updated > 0)
    }

    pub async fn remove_alert_subscription(&self, guild_id: i64) -> Result<bool, Error> {
        let deleted = self.client
            .execute("DELETE FROM skysearch_alerts WHERE guild_id = $1", &[&guild_id])
            .await?;
        Ok(deleted > 0)
    }

    // Counters

    pub async fn adjust_counter(&self, guild_id: i64, name: &str, delta: i64) -> Result<i64, Error> {
        let row = self.client
            .query_one(
                "INSERT INTO counters (guild_id, name, value)
                 VALUES ($1, $2, $3)
                 ON CONFLICT (guild_id, name)
                 DO UPDATE SET value = counters.value + EXCLUDED.value
                 RETURNING value",
                &[&guild_id, &name, &delta],
            )
            .await?;

        Ok(row.get(0))
    }

    pub async fn fetch_counter(&self, guild_id: i64, name: &str) -> Result<Option<i64>, Error> {
        let row = self.client
            .query_opt(
                "SELECT value FROM counters WHERE guild_id = $1 AND name = $2",
                &[&guild_id, &name],
            )
            .await?;

        Ok(row.map(|r| r.get(0)))
    }

    pub async fn reset_counter(&self, guild_id: i64, name: &str) -> Result<bool, Error> {
        let deleted = self.client
            .execute(
                "DELETE FROM counters WHERE guild_id = $1 AND name = $2",
                &[&guild_id, &name],
            )
            .await?;
        Ok(deleted > 0)
    }

    pub async fn list_counters(&self, guild_id: i64) -> Result<Vec<(String, i64)>, Error> {
        let rows = self.client
            .query(
                "SELECT name, value FROM counters WHERE guild_id = $1 ORDER BY name",
                &[&guild_id],
            )
            .await?;

        Ok(rows.iter().map(|r| (r.get(0), r.get(1))).collect())
    }

    // Loans

    pub async fn add_loan(&self, guild_id: i64, lender_id: i64, borrower_id: i64, amount: i64) -> Result<i64, Error> {
        let row = self.client
            .query_one(
                "INSERT INTO loans (guild_id, lender_id, borrower_id, amount)
                 VALUES ($1, $2, $3, $4)
                 ON CONFLICT (guild_id, lender_id, borrower_id)
                 DO UPDATE SET amount = loans.amount + EXCLUDED.amount
                 RETURNING amount",
                &[&guild_id, &lender_id, &borrower_id, &amount],
            )
            .await?;

        Ok(row.get(0))
    }

    pub async fn fetch_loan(&self, guild_id: i64, lender_id: i64, borrower_id: i64) -> Result<i64, Error> {
        let row = self.client
            .query_opt(
                "SELECT amount FROM loans WHERE guild_id = $1 AND lender_id = $2 AND borrower_id = $3",
                &[&guild_id, &lender_id, &borrower_id],
            )
            .await?;

        Ok(row.map(|r| r.get(0)).unwrap_or(0))
    }

    /// Reduces a debt and returns the remaining balance, `None` once settled.
    /// Settled loans are removed; overpaying is rejected by `apply_repayment`.
    pub async fn repay_loan(&self, guild_id: i64, lender_id: i64, borrower_id: i64, amount: i64) -> Result<Option<i64>, Error> {
        let owed = self.fetch_loan(guild_id, lender_id, borrower_id).await?;
        let remaining = apply_repayment(owed, amount)?;

        // Only applies while the balance is still `owed`.
        let changed = match remaining {
            Some(balance) => {
                self.client
                    .execute(
                        "UPDATE loans SET amount = $5
                         WHERE guild_id = $1 AND lender_id = $2 AND borrower_id = $3 AND amount = $4",
                        &[&guild_id, &lender_id, &borrower_id, &owed, &balance],
                    )
                    .await?
            }
            None => {
                self.client
                    .execute(
                        "DELETE FROM loans WHERE guild_id = $1 AND lender_id = $2 AND borrower_id = $3 AND amount = $4",
                        &[&guild_id, &lender_id, &borrower_id, &owed],
                    )
                    .await?
            }
        };
        if changed == 0 {
            return Err(Error::InvalidInput("That loan changed while recording the repayment; try again.".to_string()));
        }

        Ok(remaining)
    }

    /// Every outstanding loan in the guild that involves `user_id`.
    pub async fn loans_for_user(&self, guild_id: i64, user_id: i64) -> Result<Vec<LoanRecord>, Error> {
        let rows = self.client
            .query(
                "SELECT lender_id, borrower_id, amount FROM loans
                 WHERE guild_id = $1 AND (lender_id = $2 OR borrower_id = $2)
                 ORDER BY amount DESC",
                &[&guild_id, &user_id],
            )
            .await?;

        Ok(rows.iter().map(loan_from_row).collect())
    }

    pub async fn guild_ledger(&self, guild_id: i64, limit: i64) -> Result<Vec<LoanRecord>, Error> {
        let rows = self.client
            .query(
                "SELECT lender_id, borrower_id, amount FROM loans WHERE guild_id = $1
                 ORDER BY amount DESC LIMIT $2",
                &[&guild_id, &limit],
            )
            .await?;

        Ok(rows.iter().map(loan_from_row).collect())
    }

    // Pancakes

    pub async fn record_pancake_flip(&self, user_id: i64, outcome: PancakeOutcome) -> Result<PancakeStats, Error> {
        // `column` is one of four fixed identifiers.
        let column = outcome.column();
        let query = format!(
            "INSERT INTO pancake_stats (user_id, flips, {column})
             VALUES ($1, 1, 1)
             ON CONFLICT (user_id)
             DO UPDATE SET flips = pancake_stats.flips + 1, {column} = pancake_stats.{column} + 1
             RETURNING flips, perfect, dropped, stuck, burnt"
        );
        let row = self.client.query_one(query.as_str(), &[&user_id]).await?;
        Ok(pancake_stats_from_row(&row))
    }

    pub async fn fetch_pancake_stats(&self, user_id: i64) -> Result<PancakeStats, Error> {
        let row = self.client
            .query_opt(
                "SELECT flips, perfect, dropped, stuck, burnt FROM pancake_stats WHERE user_id = $1",
                &[&user_id],
            )
            .await?;

        Ok(row.as_ref().map(pancake_stats_from_row).unwrap_or_default())
    }

    pub async fn pancake_leaderboard(&self, limit: i64) -> Result<Vec<(i64, PancakeStats)>, Error> {
        let rows = self.client
            .query(
                "SELECT user_id, flips, perfect, dropped, stuck, burnt FROM pancake_stats
                 ORDER BY perfect DESC, flips ASC LIMIT $1",
                &[&limit],
            )
            .await?;

        Ok(rows
            .iter()
            .map(|r| {
                let stats = PancakeStats {
                    flips: r.get(1),
                    perfect: r.get(2),
                    dropped: r.get(3),
                    stuck: r.get(4),
                    burnt: r.get(5),
                };
                (r.get(0), stats)
            })
            .collect())
    }

    // Typo-watch

    pub async fn fetch_typowatch_enabled(&self, guild_id: i64) -> Result<bool, Error> {
        let row = self.client
            .query_opt(
                "SELECT enabled FROM typowatch_settings WHERE guild_id = $1",
                &[&guild_id],
            )
            .await?;

        Ok(row.map(|r| r.get(0)).unwrap_or(false))
    }

    pub async fn store_typowatch_enabled(&self, guild_id: i64, enabled: bool) -> Result<(), Error> {
        self.client
            .execute(
                "INSERT INTO typowatch_settings (guild_id, enabled) VALUES ($1, $2)
                ON CONFLICT (guild_id) DO UPDATE SET enabled = EXCLUDED.enabled",
                &[&guild_id, &enabled],
            )
            .await?;
        Ok(())
    }

    pub async fn store_typo(&self, guild_id: i64, typo: &str, correction: &str) -> Result<(), Error> {
        self.client
            .execute(
                "INSERT INTO typowatch_words (guild_id, typo, correction) VALUES ($1, $2, $3)
                ON CONFLICT (guild_id, typo) DO UPDATE SET correction = EXCLUDED.correction",
                &[&guild_id, &typo, &correction],
            )
            .await?;
        Ok(())
    }

    pub async fn remove_typo(&self, guild_id: i64, typo: &str) -> Result<bool, Error> {
        let deleted = self.client
            .execute(
                "DELETE FROM typowatch_words WHERE guild_id = $1 AND typo = $2",
                &[&guild_id, &typo],
            )
            .await?;
        Ok(deleted > 0)
    }

    pub async fn fetch_typos(&self, guild_id: i64) -> Result<Vec<(String, String)>, Error> {
        let rows = self.client
            .query(
                "SELECT typo, correction FROM typowatch_words WHERE guild_id = $1 ORDER BY typo",
                &[&guild_id],
            )
            .await?;

        Ok(rows.iter().map(|r| (r.get(0), r.get(1))).collect())
    }

    // Ghost-ping

    pub async fn fetch_ghostping_settings(&self, guild_id: i64) -> Result<GhostPingSettings, Error> {
        let row = self.client
            .query_opt(
                "SELECT enabled, log_channel_id FROM ghostping_settings WHERE guild_id = $1",
                &[&guild_id],
            )
            .await?;

        Ok(row
            .map(|r| GhostPingSettings {
                enabled: r.get(0),
                log_channel_id: r.get(1),
            })
            .unwrap_or(GhostPingSettings {
                enabled: false,
                log_channel_id: None,
            }))
    }

    pub async fn store_ghostping_settings(&self, guild_id: i64, settings: GhostPingSettings) -> Result<(), Error> {
        self.client
            .execute(
                "INSERT INTO ghostping_settings (guild_id, enabled, log_channel_id) VALUES ($1, $2, $3)
                ON CONFLICT (guild_id) DO UPDATE SET enabled = EXCLUDED.enabled, log_channel_id = EXCLUDED.log_channel_id",
                &[&guild_id, &settings.enabled, &settings.log_channel_id],
            )
            .await?;
        Ok(())
    }
}

fn subscription_from_row(row: &Row) -> AlertSubscription {
    AlertSubscription {
        guild_id: row.get(0),
        channel_id: row.get(1),
        role_id: row.get(2),
        cooldown_minutes: row.get(3),
    }
}

fn loan_from_row(row: &Row) -> LoanRecord {
    LoanRecord {
        lender_id: row.get(0),
        borrower_id: row.get(1),
        amount: row.get(2),
    }
}

fn pancake_stats_from_row(row: &Row) -> PancakeStats {
    PancakeStats {
        flips: row.get(0),
        perfect: row.get(1),
        dropped: row.get(2),
        stuck: row.get(3),
        burnt: row.get(4),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Runs against a scratch database when `DATABASE_URL` is set; skipped otherwise.
    async fn scratch_database() -> Option<(Database, i64)> {
        let url = std::env::var("DATABASE_URL").ok()?;
        let database = Database::connect(&url).await.unwrap();
        database.migrate().await.unwrap();
        Some((database, rand::random::<u32>() as i64))
    }

    #[tokio::test]
    async fn loans_settle_and_reject_overpayment() {
        let Some((db, guild)) = scratch_database().await else {
            return;
        };

        assert_eq!(db.add_loan(guild, 1, 2, 30).await.unwrap(), 30);
        assert_eq!(db.add_loan(guild, 1, 2, 20).await.unwrap(), 50);

        assert!(matches!(db.repay_loan(guild, 1, 2, 80).await, Err(Error::InvalidInput(_))));
        assert_eq!(db.fetch_loan(guild, 1, 2).await.unwrap(), 50);

        assert_eq!(db.repay_loan(guild, 1, 2, 15).await.unwrap(), Some(35));
        assert_eq!(db.repay_loan(guild, 1, 2, 35).await.unwrap(), None);
        assert!(db.loans_for_user(guild, 1).await.unwrap().is_empty());
        assert!(db.repay_loan(guild, 1, 2, 1).await.is_err());
    }

    #[tokio::test]
    async fn counters_accumulate_per_guild() {
        let Some((db, guild)) = scratch_database().await else {
            return;
        };

        assert_eq!(db.adjust_counter(guild, "coffee", 3).await.unwrap(), 3);
        assert_eq!(db.adjust_counter(guild, "coffee", -5).await.unwrap(), -2);
        assert_eq!(db.fetch_counter(guild + 1, "coffee").await.unwrap(), None);
        assert_eq!(db.list_counters(guild).await.unwrap(), vec![("coffee".to_string(), -2)]);

        assert!(db.reset_counter(guild, "coffee").await.unwrap());
        assert_eq!(db.fetch_counter(guild, "coffee").await.unwrap(), None);
    }
}
