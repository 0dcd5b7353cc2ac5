// commands/help.rs
use crate::error::Error;
use crate::Data;

const HELP_FOOTER: &str = "\
SkySearch data comes from airplanes.live with adsb.lol as a fallback.
Type /help <command> for more info on a command.";

/// Show help for commands
#[poise::command(slash_command, category = "Utility")]
pub async fn help(
    ctx: poise::Context<'_, Data, Error>,
    #[description = "Specific command to show help about"]
    #[autocomplete = "poise::builtins::autocomplete_command"]
    command: Option<String>,
) -> Result<(), Error> {
    let config = poise::builtins::HelpConfiguration {
        extra_text_at_bottom: HELP_FOOTER,
        show_subcommands: true,
        ephemeral: true,
        ..Default::default()
    };
    poise::builtins::help(ctx, command.as_deref(), config).await?;
    Ok(())
}
