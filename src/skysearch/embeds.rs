// skysearch/embeds.rs
use crate::skysearch::aircraft::{Aircraft, EmergencySquawk};
use crate::skysearch::photos::AircraftPhoto;
use crate::utils::{or_na, title_case, truncate, EMBED_FIELD_LIMIT};
use poise::serenity_prelude::{CreateEmbed, CreateEmbedFooter};

const TRACKER_URL: &str = "https://globe.airplanes.live/?icao=";
const MAX_LISTED: usize = 10;

pub fn tracker_link(aircraft: &Aircraft) -> Option<String> {
    aircraft.hex().map(|hex| format!("{}{}", TRACKER_URL, hex))
}

fn title(aircraft: &Aircraft) -> String {
    match (aircraft.desc.as_deref(), aircraft.type_code.as_deref()) {
        (Some(desc), _) => desc.to_string(),
        (None, Some(type_code)) => type_code.to_string(),
        (None, None) => "Unknown aircraft".to_string(),
    }
}

fn colour(aircraft: &Aircraft) -> u32 {
    match aircraft.emergency_squawk() {
        Some(squawk) => squawk.colour(),
        None if aircraft.is_military() => 0x556B2F,
        None => 0x0099FF,
    }
}

fn flags(aircraft: &Aircraft) -> Option<String> {
    let mut flags = Vec::new();
    if aircraft.is_military() {
        flags.push("Military");
    }
    if aircraft.is_ladd() {
        flags.push("LADD");
    }
    if aircraft.is_pia() {
        flags.push("PIA");
    }
    (!flags.is_empty()).then(|| flags.join(", "))
}

pub fn aircraft_embed(aircraft: &Aircraft, photo: Option<&AircraftPhoto>) -> CreateEmbed {
    let mut embed = CreateEmbed::new()
        .title(title(aircraft))
        .color(colour(aircraft))
        .field("Callsign", or_na(aircraft.callsign()), true)
        .field("Registration", or_na(aircraft.registration.as_deref()), true)
        .field("ICAO", or_na(aircraft.hex()), true)
        .field("Altitude", aircraft.altitude_text(), true)
        .field("Ground speed", or_na(aircraft.gs.map(|gs| format!("{:.0} kt", gs))), true)
        .field("Heading", or_na(aircraft.track.map(|t| format!("{:.0}°", t))), true)
        .field("Vertical rate", or_na(aircraft.baro_rate.map(|r| format!("{:.0} ft/min", r))), true)
        .field("Squawk", or_na(aircraft.squawk.as_deref()), true)
        .field(
            "Position",
            or_na(aircraft.position().map(|(lat, lon)| format!("{:.4}, {:.4}", lat, lon))),
            true,
        );

    if let Some(operator) = aircraft.operator.as_deref() {
        embed = embed.field("Operator", operator, true);
    }
    if let Some(flags) = flags(aircraft) {
        embed = embed.field("Flags", flags, true);
    }
    if let Some(category) = aircraft.category.as_deref() {
        embed = embed.field("Category", category, true);
    }
    match (aircraft.emergency_squawk(), aircraft.reported_emergency()) {
        (Some(squawk), _) => {
            embed = embed.field("Emergency", format!("{} ({})", squawk, squawk.code()), false);
        }
        (None, Some(reported)) => {
            embed = embed.field("Emergency", title_case(&reported.replace('_', " ")), false);
        }
        (None, None) => {}
    }
    if let Some(link) = tracker_link(aircraft) {
        embed = embed.url(link);
    }
    if let Some(photo) = photo {
        embed = embed.thumbnail(&photo.image_url);
        if let Some(link) = &photo.link {
            embed = embed.field("Photo", format!("[View on Planespotters]({})", link), true);
        }
        if let Some(photographer) = &photo.photographer {
            embed = embed.footer(CreateEmbedFooter::new(format!("Photo © {}", photographer)));
        }
    }
    if let Some(seen) = aircraft.seen {
        embed = embed.field("Last seen", format!("{:.0} s ago", seen), true);
    }

    embed
}

/// Adds a compact listing of extra results to an existing embed.
pub fn with_other_aircraft(embed: CreateEmbed, others: &[Aircraft], total: usize) -> CreateEmbed {
    if others.is_empty() {
        return embed;
    }

    let mut lines: Vec<String> = others.iter().take(MAX_LISTED).map(Aircraft::summary_line).collect();
    if others.len() > MAX_LISTED {
        lines.push(format!("…and {} more", others.len() - MAX_LISTED));
    }

    embed.field(
        format!("Other aircraft ({} total)", total),
        truncate(&lines.join("\n"), EMBED_FIELD_LIMIT),
        false,
    )
}

pub fn emergency_embed(aircraft: &Aircraft, squawk: EmergencySquawk) -> CreateEmbed {
    let description = format!(
        "**{}** is squawking **{}** ({})",
        aircraft
            .callsign()
            .map(str::to_string)
            .or_else(|| aircraft.registration.clone())
            .or_else(|| aircraft.hex())
            .unwrap_or_else(|| "Unknown aircraft".to_string()),
        squawk.code(),
        squawk,
    );

    aircraft_embed(aircraft, None)
        .title(format!("Emergency squawk {}: {}", squawk.code(), squawk))
        .description(description)
        .color(squawk.colour())
        .timestamp(chrono::Utc::now())
}

pub fn landed_embed(aircraft: &Aircraft) -> CreateEmbed {
    let name = aircraft
        .callsign()
        .map(str::to_string)
        .or_else(|| aircraft.hex())
        .unwrap_or_else(|| "The aircraft".to_string());

    let mut embed = CreateEmbed::new()
        .title("Aircraft has landed")
        .description(format!("{} appears to be on the ground ({}).", name, aircraft.altitude_text()))
        .color(0x2ECC71);
    if let Some((lat, lon)) = aircraft.position() {
        embed = embed.field("Last position", format!("{:.4}, {:.4}", lat, lon), false);
    }
    embed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skysearch::aircraft::Altitude;

    fn sample() -> Aircraft {
        Aircraft {
            hex: Some("A1B2C3".to_string()),
            flight: Some("DAL42 ".to_string()),
            registration: Some("N42DL".to_string()),
            type_code: Some("A321".to_string()),
            alt_baro: Some(Altitude::Feet(12000.0)),
            squawk: Some("7600".to_string()),
            lat: Some(40.0),
            lon: Some(-73.5),
            ..Default::default()
        }
    }

    #[test]
    fn aircraft_embed_carries_core_fields() {
        let photo = AircraftPhoto {
            image_url: "https://img/1.jpg".to_string(),
            link: None,
            photographer: Some("Sam".to_string()),
        };
        let value = serde_json::to_value(aircraft_embed(&sample(), Some(&photo))).unwrap();

        assert_eq!(value["title"], "A321");
        assert_eq!(value["url"], "https://globe.airplanes.live/?icao=a1b2c3");
        assert_eq!(value["thumbnail"]["url"], "https://img/1.jpg");
        assert_eq!(value["color"], EmergencySquawk::RadioFailure.colour());
        let fields = value["fields"].as_array().unwrap();
        assert!(fields.iter().any(|f| f["name"] == "Emergency" && f["value"] == "Radio failure (7600)"));
        assert!(fields.iter().any(|f| f["name"] == "Callsign" && f["value"] == "DAL42"));
    }

    #[test]
    fn photo_link_and_reported_status_are_shown() {
        let photo = AircraftPhoto {
            image_url: "https://img/2.jpg".to_string(),
            link: Some("https://www.planespotters.net/photo/1".to_string()),
            photographer: None,
        };
        let aircraft = Aircraft {
            squawk: Some("1200".to_string()),
            emergency: Some("lifeguard".to_string()),
            category: Some("A3".to_string()),
            seen: Some(2.4),
            ..sample()
        };
        let value = serde_json::to_value(aircraft_embed(&aircraft, Some(&photo))).unwrap();
        let fields = value["fields"].as_array().unwrap();

        let field = |name: &str| fields.iter().find(|f| f["name"] == name).map(|f| f["value"].clone());
        assert_eq!(field("Photo").unwrap(), "[View on Planespotters](https://www.planespotters.net/photo/1)");
        assert_eq!(field("Emergency").unwrap(), "Lifeguard");
        assert_eq!(field("Category").unwrap(), "A3");
        assert_eq!(field("Last seen").unwrap(), "2 s ago");
        assert!(value["footer"].is_null());
    }

    #[test]
    fn emergency_embed_names_the_aircraft() {
        let value = serde_json::to_value(emergency_embed(&sample(), EmergencySquawk::RadioFailure)).unwrap();
        assert_eq!(value["title"], "Emergency squawk 7600: Radio failure");
        assert!(value["description"].as_str().unwrap().contains("DAL42"));
    }

    #[test]
    fn other_aircraft_listing_is_capped() {
        let others = vec![sample(); 15];
        let value = serde_json::to_value(with_other_aircraft(CreateEmbed::new(), &others, 16)).unwrap();
        let listing = value["fields"][0]["value"].as_str().unwrap();
        assert_eq!(value["fields"][0]["name"], "Other aircraft (16 total)");
        assert!(listing.ends_with("…and 5 more"));
    }
}
