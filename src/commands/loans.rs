// commands/loans.rs
use crate::error::Error;
use crate::utils::{require_guild, truncate, EMBED_DESCRIPTION_LIMIT};
use crate::Data;
use poise::serenity_prelude::{CreateAllowedMentions, CreateEmbed, User};

type Context<'a> = poise::Context<'a, Data, Error>;

const LEDGER_LIMIT: i64 = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoanRecord {
    pub lender_id: i64,
    pub borrower_id: i64,
    pub amount: i64,
}

/// Net position of one user across their loans.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct LoanSummary {
    pub owed_to_user: i64,
    pub owed_by_user: i64,
}

impl LoanSummary {
    pub fn for_user(user_id: i64, loans: &[LoanRecord]) -> Self {
        loans.iter().fold(Self::default(), |mut summary, loan| {
            if loan.lender_id == user_id {
                summary.owed_to_user += loan.amount;
            }
            if loan.borrower_id == user_id {
                summary.owed_by_user += loan.amount;
            }
            summary
        })
    }

    pub fn net(&self) -> i64 {
        self.owed_to_user - self.owed_by_user
    }
}

fn validate_parties(lender: &User, borrower: &User, amount: i64) -> Result<(), Error> {
    if amount <= 0 {
        return Err(Error::InvalidInput("Amount must be positive.".to_string()));
    }
    if lender.id == borrower.id {
        return Err(Error::InvalidInput("You can't lend to yourself.".to_string()));
    }
    if borrower.bot {
        return Err(Error::InvalidInput("Bots don't take out loans.".to_string()));
    }
    Ok(())
}

/// Balance left after repaying `amount` of `owed`; `None` once the loan is settled.
pub fn apply_repayment(owed: i64, amount: i64) -> Result<Option<i64>, Error> {
    if amount <= 0 {
        return Err(Error::InvalidInput("Amount must be positive.".to_string()));
    }
    if owed <= 0 {
        return Err(Error::InvalidInput("You don't owe them anything.".to_string()));
    }
    if amount > owed {
        return Err(Error::InvalidInput(format!(
            "You only owe **{}**; nothing was recorded.",
            owed
        )));
    }
    Ok(Some(owed - amount).filter(|remaining| *remaining > 0))
}

pub fn format_loan(loan: &LoanRecord) -> String {
    format!("<@{}> owes <@{}> **{}**", loan.borrower_id, loan.lender_id, loan.amount)
}

/// Track who owes whom in this server
#[poise::command(
    slash_command,
    subcommands("lend", "repay", "balance", "ledger"),
    guild_only,
    category = "Fun"
)]
pub async fn loan(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Record money you lent to someone
#[poise::command(slash_command)]
pub async fn lend(
    ctx: Context<'_>,
    #[description = "Who borrowed from you"] borrower: User,
    #[description = "Amount lent"]
    #[min = 1]
    amount: i64,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx.guild_id())?;
    validate_parties(ctx.author(), &borrower, amount)?;

    let total = ctx.data().database
        .add_loan(guild_id, ctx.author().id.get() as i64, borrower.id.get() as i64, amount)
        .await?;

    ctx.send(
        poise::CreateReply::default()
            .content(format!("✅ Recorded. <@{}> now owes you **{}**.", borrower.id, total))
            .allowed_mentions(CreateAllowedMentions::new()),
    )
    .await?;

    Ok(())
}

/// Record a repayment to someone who lent you money
#[poise::command(slash_command)]
pub async fn repay(
    ctx: Context<'_>,
    #[description = "Who you are paying back"] lender: User,
    #[description = "Amount repaid"]
    #[min = 1]
    amount: i64,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx.guild_id())?;
    validate_parties(&lender, ctx.author(), amount)?;
    let lender_id = lender.id.get() as i64;
    let borrower_id = ctx.author().id.get() as i64;

    let reply = match ctx.data().database.repay_loan(guild_id, lender_id, borrower_id, amount).await? {
        None => format!("✅ Paid off! You no longer owe <@{}> anything.", lender.id),
        Some(remaining) => format!("✅ Recorded. You still owe <@{}> **{}**.", lender.id, remaining),
    };

    ctx.send(
        poise::CreateReply::default()
            .content(reply)
            .allowed_mentions(CreateAllowedMentions::new()),
    )
    .await?;

    Ok(())
}

/// Show outstanding loans for you or another member
#[poise::command(slash_command)]
pub async fn balance(
    ctx: Context<'_>,
    #[description = "Member to check (default you)"] user: Option<User>,
) -> Result<(), Error> {
    let guild_id = require_guild(ctx.guild_id())?;
    let user = user.as_ref().unwrap_or_else(|| ctx.author());
    let user_id = user.id.get() as i64;

    let loans = ctx.data().database.loans_for_user(guild_id, user_id).await?;
    let summary = LoanSummary::for_user(user_id, &loans);

    let description = if loans.is_empty() {
        "No outstanding loans.".to_string()
    } else {
        loans.iter().map(format_loan).collect::<Vec<_>>().join("\n")
    };

    let embed = CreateEmbed::new()
        .title(format!("Loans for {}", user.name))
        .description(truncate(&description, EMBED_DESCRIPTION_LIMIT))
        .field("Owed to them", summary.owed_to_user.to_string(), true)
        .field("They owe", summary.owed_by_user.to_string(), true)
        .field("Net", summary.net().to_string(), true)
        .color(if summary.net() >= 0 { 0x2ECC71 } else { 0xE74C3C });

    ctx.send(poise::CreateReply::default().embed(embed)).await?;

    Ok(())
}

/// Show the largest outstanding loans in this server
#[poise::command(slash_command)]
pub async fn ledger(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = require_guild(ctx.guild_id())?;
    let loans = ctx.data().database.guild_ledger(guild_id, LEDGER_LIMIT).await?;

    if loans.is_empty() {
        ctx.say("Nobody owes anybody anything. 🎉").await?;
        return Ok(());
    }

    let embed = CreateEmbed::new()
        .title("Loan ledger")
        .description(truncate(
            &loans.iter().map(format_loan).collect::<Vec<_>>().join("\n"),
            EMBED_DESCRIPTION_LIMIT,
        ))
        .color(0xF39C12);

    ctx.send(poise::CreateReply::default().embed(embed)).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use poise::serenity_prelude::UserId;

    fn user(id: u64, bot: bool) -> User {
        let mut user = User::default();
        user.id = UserId::new(id);
        user.bot = bot;
        user
    }

    #[test]
    fn summary_nets_both_directions() {
        let loans = vec![
            LoanRecord { lender_id: 1, borrower_id: 2, amount: 50 },
            LoanRecord { lender_id: 3, borrower_id: 1, amount: 20 },
            LoanRecord { lender_id: 1, borrower_id: 4, amount: 5 },
        ];
        let summary = LoanSummary::for_user(1, &loans);
        assert_eq!(summary, LoanSummary { owed_to_user: 55, owed_by_user: 20 });
        assert_eq!(summary.net(), 35);
    }

    #[test]
    fn parties_are_validated() {
        assert!(validate_parties(&user(1, false), &user(2, false), 10).is_ok());
        assert!(validate_parties(&user(1, false), &user(1, false), 10).is_err());
        assert!(validate_parties(&user(1, false), &user(2, true), 10).is_err());
        assert!(validate_parties(&user(1, false), &user(2, false), 0).is_err());
    }

    #[test]
    fn repayments_never_exceed_the_balance() {
        assert_eq!(apply_repayment(50, 20).unwrap(), Some(30));
        assert_eq!(apply_repayment(50, 50).unwrap(), None);
        assert!(matches!(apply_repayment(50, 51), Err(Error::InvalidInput(msg)) if msg.contains("**50**")));
        assert!(apply_repayment(0, 10).is_err());
        assert!(apply_repayment(50, 0).is_err());
    }

    #[test]
    fn loan_lines_mention_both_users() {
        let line = format_loan(&LoanRecord { lender_id: 1, borrower_id: 2, amount: 7 });
        assert_eq!(line, "<@2> owes <@1> **7**");
    }
}
