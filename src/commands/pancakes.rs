// commands/pancakes.rs
use crate::error::Error;
use crate::Data;
use poise::serenity_prelude::{CreateAllowedMentions, CreateEmbed, User};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

type Context<'a> = poise::Context<'a, Data, Error>;

const LEADERBOARD_SIZE: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PancakeOutcome {
    Perfect,
    Stuck,
    Dropped,
    Burnt,
}

impl PancakeOutcome {
    const ALL: [PancakeOutcome; 4] = [
        PancakeOutcome::Perfect,
        PancakeOutcome::Stuck,
        PancakeOutcome::Dropped,
        PancakeOutcome::Burnt,
    ];

    fn weight(self) -> u32 {
        match self {
            PancakeOutcome::Perfect => 50,
            PancakeOutcome::Stuck => 15,
            PancakeOutcome::Dropped => 25,
            PancakeOutcome::Burnt => 10,
        }
    }

    /// Stats column counting this outcome.
    pub fn column(self) -> &'static str {
        match self {
            PancakeOutcome::Perfect => "perfect",
            PancakeOutcome::Stuck => "stuck",
            PancakeOutcome::Dropped => "dropped",
            PancakeOutcome::Burnt => "burnt",
        }
    }

    pub fn roll<R: Rng + ?Sized>(rng: &mut R) -> Self {
        // Weights are non-zero constants, so the distribution always builds.
        WeightedIndex::new(Self::ALL.map(Self::weight))
            .map(|dist| Self::ALL[dist.sample(rng)])
            .unwrap_or(PancakeOutcome::Perfect)
    }

    fn message(self) -> &'static str {
        match self {
            PancakeOutcome::Perfect => "🥞 A perfect flip! Golden brown and back in the pan.",
            PancakeOutcome::Stuck => "😱 Too much wrist. The pancake is stuck to the ceiling.",
            PancakeOutcome::Dropped => "💥 Splat. The pancake missed the pan entirely.",
            PancakeOutcome::Burnt => "🔥 You waited too long. It's charcoal now.",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PancakeStats {
    pub flips: i32,
    pub perfect: i32,
    pub dropped: i32,
    pub stuck: i32,
    pub burnt: i32,
}

impl PancakeStats {
    pub fn success_rate(&self) -> f64 {
        if self.flips == 0 {
            0.0
        } else {
            self.perfect as f64 * 100.0 / self.flips as f64
        }
    }

    pub fn title(&self) -> &'static str {
        match (self.flips, self.success_rate()) {
            (0, _) => "Has never held a spatula",
            (f, _) if f < 10 => "Apprentice flipper",
            (_, r) if r >= 70.0 => "Pancake virtuoso",
            (_, r) if r >= 50.0 => "Line cook",
            _ => "Ceiling decorator",
        }
    }
}

/// Flip pancakes and compare your skills
#[poise::command(slash_command, subcommands("flip", "stats", "leaderboard"), category = "Fun")]
pub async fn pancake(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Try to flip a pancake
#[poise::command(slash_command)]
pub async fn flip(ctx: Context<'_>) -> Result<(), Error> {
    let outcome = PancakeOutcome::roll(&mut rand::thread_rng());
    let stats = ctx.data().database
        .record_pancake_flip(ctx.author().id.get() as i64, outcome)
        .await?;

    ctx.say(format!(
        "{}\n-# {} perfect out of {} flips ({:.0}%)",
        outcome.message(),
        stats.perfect,
        stats.flips,
        stats.success_rate()
    ))
    .await?;

    Ok(())
}

/// Show pancake statistics
#[poise::command(slash_command)]
pub async fn stats(
    ctx: Context<'_>,
    #[description = "Member to check (default you)"] user: Option<User>,
) -> Result<(), Error> {
    let user = user.as_ref().unwrap_or_else(|| ctx.author());
    let stats = ctx.data().database.fetch_pancake_stats(user.id.get() as i64).await?;

    let embed = CreateEmbed::new()
        .title(format!("{}'s pancakes", user.name))
        .description(stats.title())
        .field("Flips", stats.flips.to_string(), true)
        .field("Perfect", stats.perfect.to_string(), true)
        .field("Success", format!("{:.1}%", stats.success_rate()), true)
        .field("Dropped", stats.dropped.to_string(), true)
        .field("On the ceiling", stats.stuck.to_string(), true)
        .field("Burnt", stats.burnt.to_string(), true)
        .thumbnail(user.face())
        .color(0xD2691E);

    ctx.send(poise::CreateReply::default().embed(embed)).await?;

    Ok(())
}

/// Show the best pancake flippers
#[poise::command(slash_command)]
pub async fn leaderboard(ctx: Context<'_>) -> Result<(), Error> {
    let board = ctx.data().database.pancake_leaderboard(LEADERBOARD_SIZE).await?;

    if board.is_empty() {
        ctx.say("Nobody has flipped a pancake yet.").await?;
        return Ok(());
    }

    let lines = board
        .iter()
        .enumerate()
        .map(|(i, (user_id, stats))| {
            format!(
                "{}. <@{}>: {} perfect / {} flips ({:.0}%)",
                i + 1,
                user_id,
                stats.perfect,
                stats.flips,
                stats.success_rate()
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let embed = CreateEmbed::new()
        .title("🥞 Pancake leaderboard")
        .description(lines)
        .color(0xD2691E);

    ctx.send(
        poise::CreateReply::default()
            .embed(embed)
            .allowed_mentions(CreateAllowedMentions::new()),
    )
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn rolls_follow_weights() {
        let mut rng = StdRng::seed_from_u64(7);
        let rolls: Vec<_> = (0..10_000).map(|_| PancakeOutcome::roll(&mut rng)).collect();
        let perfect = rolls.iter().filter(|o| **o == PancakeOutcome::Perfect).count();
        let burnt = rolls.iter().filter(|o| **o == PancakeOutcome::Burnt).count();

        assert!((4_500..5_500).contains(&perfect), "perfect = {}", perfect);
        assert!((700..1_300).contains(&burnt), "burnt = {}", burnt);
        assert!(PancakeOutcome::ALL.iter().all(|o| rolls.contains(o)));
    }

    #[test]
    fn success_rate_and_titles() {
        assert_eq!(PancakeStats::default().success_rate(), 0.0);
        assert_eq!(PancakeStats::default().title(), "Has never held a spatula");

        let pro = PancakeStats { flips: 20, perfect: 15, ..Default::default() };
        assert_eq!(pro.success_rate(), 75.0);
        assert_eq!(pro.title(), "Pancake virtuoso");

        let messy = PancakeStats { flips: 20, perfect: 4, ..Default::default() };
        assert_eq!(messy.title(), "Ceiling decorator");
    }

    #[test]
    fn columns_are_distinct() {
        let mut columns: Vec<_> = PancakeOutcome::ALL.iter().map(|o| o.column()).collect();
        columns.dedup();
        assert_eq!(columns.len(), 4);
    }
}
