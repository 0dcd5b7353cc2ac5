// commands/enumber.rs
use crate::cache::TtlCache;
use crate::error::Error;
use crate::utils::{title_case, truncate, EMBED_FIELD_LIMIT};
use crate::Data;
use poise::serenity_prelude::{CreateEmbed, CreateEmbedFooter};
use serde_json::Value;

type Context<'a> = poise::Context<'a, Data, Error>;

pub type AdditiveCache = TtlCache<String, Option<Additive>>;

#[derive(Debug, Clone, PartialEq)]
pub struct Additive {
    pub code: String,
    pub name: String,
    pub classes: Vec<String>,
    pub vegan: Option<String>,
    pub vegetarian: Option<String>,
    pub efsa_evaluation: Option<String>,
    pub wikidata: Option<String>,
}

/// Normalises user input like `E-100`, `100` or `e 150a` to `e100` / `e150a`.
pub fn normalize_code(input: &str) -> Result<String, Error> {
    let compact: String = input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect::<String>()
        .to_lowercase();
    let digits_and_suffix = compact.strip_prefix('e').unwrap_or(&compact);

    let digit_count = digits_and_suffix.chars().take_while(char::is_ascii_digit).count();
    let suffix = &digits_and_suffix[digit_count..];
    let valid = (3..=4).contains(&digit_count)
        && suffix.len() <= 1
        && suffix.chars().all(|c| c.is_ascii_lowercase());

    if !valid {
        return Err(Error::InvalidInput(format!(
            "`{}` is not an E-number. Try something like `E100` or `E150a`.",
            input.trim()
        )));
    }
    Ok(format!("e{}", digits_and_suffix))
}

/// Reads the English entry of a localised taxonomy field.
fn english(entry: &Value, field: &str) -> Option<String> {
    entry.get(field)?.get("en")?.as_str().map(str::to_string)
}

fn parse_additive(code: &str, body: &Value) -> Option<Additive> {
    let entry = body.get(format!("en:{}", code))?;
    let name = english(entry, "name")?;

    let classes = english(entry, "additives_classes")
        .map(|raw| {
            raw.split(',')
                .map(|class| title_case(&class.trim().trim_start_matches("en:").replace('-', " ")))
                .filter(|class| !class.is_empty())
                .collect()
        })
        .unwrap_or_default();

    Some(Additive {
        code: code.to_uppercase(),
        name,
        classes,
        vegan: english(entry, "vegan"),
        vegetarian: english(entry, "vegetarian"),
        efsa_evaluation: english(entry, "efsa_evaluation"),
        wikidata: english(entry, "wikidata"),
    })
}

/// Looks an additive up, consulting and filling `cache`. Unknown codes are cached too.
pub async fn lookup_additive(
    client: &reqwest::Client,
    base_url: &str,
    cache: &AdditiveCache,
    code: &str,
) -> Result<Option<Additive>, Error> {
    if let Some(cached) = cache.get(&code.to_string()) {
        tracing::debug!("E-number cache hit for {}", code);
        return Ok(cached);
    }

    let tag = format!("en:{}", code);
    let response = client
        .get(base_url)
        .query(&[
            ("tagtype", "additives"),
            ("tags", tag.as_str()),
            ("fields", "name,additives_classes,vegan,vegetarian,efsa_evaluation,wikidata"),
        ])
        .send()
        .await?;
    if !response.status().is_success() {
        return Err(Error::Api(format!("E-number lookup returned {}", response.status())));
    }

    let body: Value = response.json().await?;
    let additive = parse_additive(code, &body);
    cache.insert(code.to_string(), additive.clone());
    Ok(additive)
}

/// Look up a food additive by E-number
#[poise::command(slash_command, category = "Lookups")]
pub async fn enumber(
    ctx: Context<'_>,
    #[description = "E-number, e.g. E330"] code: String,
) -> Result<(), Error> {
    let code = normalize_code(&code)?;
    ctx.defer().await?;

    let data = ctx.data();
    let additive = lookup_additive(&data.http, &data.config.apis.enumber_url, &data.enumbers, &code)
        .await?
        .ok_or_else(|| Error::NotFound(format!("No additive found for {}.", code.to_uppercase())))?;

    let mut embed = CreateEmbed::new()
        .title(&additive.name)
        .field("Code", &additive.code, true)
        .field(
            "Class",
            if additive.classes.is_empty() { "Unknown".to_string() } else { additive.classes.join(", ") },
            true,
        )
        .field("Vegan", additive.vegan.as_deref().map(title_case).unwrap_or_else(|| "Unknown".to_string()), true)
        .field(
            "Vegetarian",
            additive.vegetarian.as_deref().map(title_case).unwrap_or_else(|| "Unknown".to_string()),
            true,
        )
        .footer(CreateEmbedFooter::new("Data from Open Food Facts"))
        .color(0xF1C40F);

    if let Some(evaluation) = &additive.efsa_evaluation {
        embed = embed.field("EFSA evaluation", truncate(evaluation, EMBED_FIELD_LIMIT), false);
    }
    if let Some(wikidata) = &additive.wikidata {
        embed = embed.url(format!("https://www.wikidata.org/wiki/{}", wikidata));
    }

    ctx.send(poise::CreateReply::default().embed(embed)).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use std::time::Duration;

    #[test]
    fn normalizes_common_spellings() {
        assert_eq!(normalize_code("E100").unwrap(), "e100");
        assert_eq!(normalize_code("e-330").unwrap(), "e330");
        assert_eq!(normalize_code(" 150 a ").unwrap(), "e150a");
        assert_eq!(normalize_code("E1422").unwrap(), "e1422");
        assert!(normalize_code("E10").is_err());
        assert!(normalize_code("E100ab").is_err());
        assert!(normalize_code("sugar").is_err());
    }

    #[test]
    fn parses_taxonomy_entry() {
        let body = serde_json::json!({
            "en:e330": {
                "name": {"en": "E330 - Citric acid"},
                "additives_classes": {"en": "en:acidity-regulator,en:antioxidant"},
                "vegan": {"en": "yes"}
            }
        });
        let additive = parse_additive("e330", &body).unwrap();
        assert_eq!(additive.code, "E330");
        assert_eq!(additive.classes, vec!["Acidity Regulator", "Antioxidant"]);
        assert_eq!(additive.vegan.as_deref(), Some("yes"));
        assert_eq!(additive.vegetarian, None);

        assert!(parse_additive("e999", &serde_json::json!({"en:e999": {}})).is_none());
    }

    #[tokio::test]
    async fn lookups_are_cached_including_misses() {
        let server = MockServer::start_async().await;
        let hit = server
            .mock_async(|when, then| {
                when.method(GET).query_param("tags", "en:e100");
                then.status(200).json_body(serde_json::json!({
                    "en:e100": {"name": {"en": "E100 - Curcumin"}}
                }));
            })
            .await;
        let miss = server
            .mock_async(|when, then| {
                when.method(GET).query_param("tags", "en:e999");
                then.status(200).json_body(serde_json::json!({}));
            })
            .await;

        let client = reqwest::Client::new();
        let cache = AdditiveCache::new(Duration::from_secs(60));
        let url = server.base_url();

        for _ in 0..2 {
            let found = lookup_additive(&client, &url, &cache, "e100").await.unwrap();
            assert_eq!(found.unwrap().name, "E100 - Curcumin");
            assert!(lookup_additive(&client, &url, &cache, "e999").await.unwrap().is_none());
        }

        hit.assert_hits_async(1).await;
        miss.assert_hits_async(1).await;
    }
}
