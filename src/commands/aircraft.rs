// commands/aircraft.rs
use crate::error::Error;
use crate::skysearch::aircraft::{is_valid_hex, is_valid_squawk};
use crate::skysearch::embeds::{aircraft_embed, with_other_aircraft};
use crate::skysearch::AircraftQuery;
use crate::Data;

type Context<'a> = poise::Context<'a, Data, Error>;

const DEFAULT_RADIUS_NM: u32 = 25;

/// Look up live aircraft
#[poise::command(
    slash_command,
    subcommands("callsign", "icao", "reg", "aircraft_type", "squawk", "military", "ladd", "pia", "radius"),
    category = "SkySearch"
)]
pub async fn aircraft(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Find an aircraft by its callsign
#[poise::command(slash_command)]
pub async fn callsign(
    ctx: Context<'_>,
    #[description = "Callsign, e.g. UAL123"] callsign: String,
) -> Result<(), Error> {
    let label = format!("callsign `{}`", callsign.trim().to_uppercase());
    lookup(ctx, AircraftQuery::Callsign(callsign), label).await
}

/// Find an aircraft by its ICAO 24-bit hex address
#[poise::command(slash_command)]
pub async fn icao(
    ctx: Context<'_>,
    #[description = "Six hex digits, e.g. a1b2c3"] hex: String,
) -> Result<(), Error> {
    if !is_valid_hex(&hex) {
        return Err(Error::InvalidInput("An ICAO hex address is six hexadecimal digits.".to_string()));
    }
    let label = format!("ICAO `{}`", hex.trim().to_lowercase());
    lookup(ctx, AircraftQuery::Hex(hex), label).await
}

/// Find an aircraft by registration
#[poise::command(slash_command)]
pub async fn reg(
    ctx: Context<'_>,
    #[description = "Registration, e.g. N12345"] registration: String,
) -> Result<(), Error> {
    let label = format!("registration `{}`", registration.trim().to_uppercase());
    lookup(ctx, AircraftQuery::Registration(registration), label).await
}

/// Find aircraft of an ICAO type designator
#[poise::command(slash_command, rename = "type")]
pub async fn aircraft_type(
    ctx: Context<'_>,
    #[description = "Type designator, e.g. B738"] type_code: String,
) -> Result<(), Error> {
    let label = format!("type `{}`", type_code.trim().to_uppercase());
    lookup(ctx, AircraftQuery::Type(type_code), label).await
}

/// Find aircraft broadcasting a squawk code
#[poise::command(slash_command)]
pub async fn squawk(
    ctx: Context<'_>,
    #[description = "Four octal digits, e.g. 7700"] code: String,
) -> Result<(), Error> {
    let code = code.trim().to_string();
    if !is_valid_squawk(&code) {
        return Err(Error::InvalidInput("A squawk code is four digits from 0 to 7.".to_string()));
    }
    let label = format!("squawk `{}`", code);
    lookup(ctx, AircraftQuery::Squawk(code), label).await
}

/// Show military aircraft currently tracked
#[poise::command(slash_command)]
pub async fn military(ctx: Context<'_>) -> Result<(), Error> {
    lookup(ctx, AircraftQuery::Military, "military aircraft".to_string()).await
}

/// Show aircraft on the Limiting Aircraft Data Displayed list
#[poise::command(slash_command)]
pub async fn ladd(ctx: Context<'_>) -> Result<(), Error> {
    lookup(ctx, AircraftQuery::Ladd, "LADD aircraft".to_string()).await
}

/// Show aircraft using Privacy ICAO Addresses
#[poise::command(slash_command)]
pub async fn pia(ctx: Context<'_>) -> Result<(), Error> {
    lookup(ctx, AircraftQuery::Pia, "PIA aircraft".to_string()).await
}

/// Show aircraft around a point
#[poise::command(slash_command)]
pub async fn radius(
    ctx: Context<'_>,
    #[description = "Latitude"] latitude: f64,
    #[description = "Longitude"] longitude: f64,
    #[description = "Radius in nautical miles (max 250)"] radius: Option<u32>,
) -> Result<(), Error> {
    validate_coordinates(latitude, longitude)?;
    let radius_nm = radius.unwrap_or(DEFAULT_RADIUS_NM);
    let label = format!("{} nm of {:.4}, {:.4}", radius_nm, latitude, longitude);
    lookup(
        ctx,
        AircraftQuery::Radius { lat: latitude, lon: longitude, radius_nm },
        label,
    )
    .await
}

fn validate_coordinates(lat: f64, lon: f64) -> Result<(), Error> {
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return Err(Error::InvalidInput(
            "Latitude must be within ±90 and longitude within ±180.".to_string(),
        ));
    }
    Ok(())
}

async fn lookup(ctx: Context<'_>, query: AircraftQuery, label: String) -> Result<(), Error> {
    ctx.defer().await?;

    let response = ctx.data().skysearch.fetch(&query).await?;
    let mut found = response.ac;
    if found.is_empty() {
        ctx.say(format!("No aircraft found for {}.", label)).await?;
        return Ok(());
    }

    let total = found.len();
    let first = found.remove(0);
    let photo = match first.hex() {
        Some(hex) => ctx.data().photos.photo_for(&hex).await,
        None => None,
    };

    tracing::info!("{} aircraft found for {}", total, label);
    let embed = with_other_aircraft(aircraft_embed(&first, photo.as_ref()), &found, total);
    ctx.send(poise::CreateReply::default().embed(embed)).await?;

    Ok(())
}
