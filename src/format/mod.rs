//! HTML message assembly for Telegram delivery. Splits the rendering into a
//! static block (teams, tournament, date, link — cached per event) and a
//! dynamic line (stake tier, market, odds — rebuilt every time), matching
//! the reference formatter's split while adding the domain-rewrite and
//! text-hygiene rules the reference's simplified version omits.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use chrono::TimeZone;
use chrono_tz::Europe::Madrid;

use crate::cache::LocalCache;
use crate::calculation::Calculation;
use crate::domain::Pick;

const STATIC_TTL: Duration = Duration::from_secs(60);

pub struct MessageFormatter {
    cache: Arc<LocalCache>,
}

impl MessageFormatter {
    pub fn new(cache: Arc<LocalCache>) -> Self {
        MessageFormatter { cache }
    }

    pub async fn format(&self, pick: &Pick, calc: &Calculation) -> String {
        let static_key = format!(
            "{}:{}:{}:{}",
            normalize(&pick.teams.0),
            normalize(&pick.teams.1),
            pick.event_time_ms,
            pick.soft_bookmaker
        );
        let static_part = match self.cache.get(&static_key).await {
            Some(s) => s,
            None => {
                let s = render_static(pick);
                self.cache.set(&static_key, &s, Some(STATIC_TTL)).await;
                s
            }
        };
        let dynamic_part = render_dynamic(pick, calc);
        format!("{static_part}\n{dynamic_part}")
    }
}

fn render_static(pick: &Pick) -> String {
    let emoji = sport_emoji(&pick.sport_id);
    let teams_line = format!(
        "{emoji} <b>{}</b> vs <b>{}</b>",
        escape_html(&clean_text(&pick.teams.0)),
        escape_html(&clean_text(&pick.teams.1))
    );
    let tournament_line = format!("\u{1F3C6} {}", escape_html(&clean_text(&pick.tournament)));
    let date_line = format_date(pick.event_time_ms);
    let link_line = pick
        .link
        .as_ref()
        .map(|l| format!("\u{1F517} {}", escape_html(&rewrite_domain(l))))
        .unwrap_or_default();
    if link_line.is_empty() {
        format!("{teams_line}\n{tournament_line}\n{date_line}")
    } else {
        format!("{teams_line}\n{tournament_line}\n{date_line}\n{link_line}")
    }
}

fn render_dynamic(pick: &Pick, calc: &Calculation) -> String {
    let emoji = calc.stake_tier.map(|t| t.emoji()).unwrap_or("");
    let market = clean_text(&format!("{} {}", pick.market.as_str(), pick.variety));
    format!(
        "{emoji} <b>{}</b> @ {:.2} (min {:.2})",
        escape_html(&market.to_uppercase()),
        pick.soft_odds,
        calc.min_odds,
    )
}

fn sport_emoji(sport_id: &str) -> &'static str {
    match sport_id.trim().to_lowercase().as_str() {
        "football" => "\u{26BD}\u{FE0F}",
        "basketball" => "\u{1F3C0}",
        "americanfootball" => "\u{1F3C8}",
        "rugby" => "\u{1F3C9}",
        "hockey" => "\u{1F3D2}",
        "tennis" => "\u{1F3BE}",
        "tabletennis" => "\u{1F3D3}",
        "handball" => "\u{1F93E}",
        "baseball" => "\u{26BE}\u{FE0F}",
        "volleyball" => "\u{1F3D0}",
        "e_football" => "\u{1F3AE}",
        "darts" => "\u{1F3AF}",
        _ => "\u{1F3DF}\u{FE0F}",
    }
}

fn spanish_weekday(weekday: chrono::Weekday) -> &'static str {
    use chrono::Weekday::*;
    match weekday {
        Mon => "Lunes",
        Tue => "Martes",
        Wed => "Miercoles",
        Thu => "Jueves",
        Fri => "Viernes",
        Sat => "Sabado",
        Sun => "Domingo",
    }
}

/// `📅 DD/MM/YYYY (Weekday HH:MM)` in Europe/Madrid local time.
fn format_date(event_time_ms: i64) -> String {
    let utc = chrono::Utc.timestamp_millis_opt(event_time_ms).single();
    let Some(utc) = utc else {
        return "\u{1F4C5} unknown".to_string();
    };
    let local = utc.with_timezone(&Madrid);
    let date = local.format("%d/%m/%Y").to_string();
    let time = local.format("%H:%M").to_string();
    let weekday = spanish_weekday(local.weekday());
    format!("\u{1F4C5} {date} ({weekday} {time})")
}

fn replacement_table() -> &'static HashMap<&'static str, &'static str> {
    static TABLE: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut m = HashMap::new();
        m.insert("win1retx", "dnb1");
        m.insert("win2retx", "dnb2");
        m.insert("winonly1", "win1");
        m.insert("winonly2", "win2");
        m.insert("win1", "win1");
        m.insert("win2", "win2");
        m.insert("_1x", "1x");
        m.insert("_x2", "x2");
        m.insert("_12", "12");
        m.insert("e_over", "e over");
        m.insert("e_under", "e under");
        m
    })
}

fn stopwords() -> &'static [&'static str] {
    &[
        "point", "points", "overall", "regular", "overtime", "regulartime", "goal", "goals",
        "set", "game", "games", "total", "match", "matches", "time",
    ]
}

/// Lowercases, strips stopwords (whole-word), applies the market-term
/// substitution table, then collapses whitespace. Escaping happens
/// separately, after this, never before.
fn clean_text(input: &str) -> String {
    let lower = input.trim().to_lowercase();
    let mut words: Vec<&str> = lower.split_whitespace().collect();
    let stop = stopwords();
    words.retain(|w| !stop.contains(w));
    let mut cleaned = words.join(" ");
    for (from, to) in replacement_table() {
        cleaned = cleaned.replace(from, to);
    }
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Bit-exact deep-link domain rewriting for a handful of target
/// bookmakers' public sites.
fn rewrite_domain(link: &str) -> String {
    if link.contains("bet365.com") {
        let rewritten = link.replacen("bet365.com", "bet365.es", 1);
        return uppercase_path_after(&rewritten, "bet365.es");
    }
    if link.contains("sports.betway.com/en/sports") {
        return link.replacen(
            "sports.betway.com/en/sports",
            "sports.betway.es/es/sports",
            1,
        );
    }
    if link.contains("sports.bwin.com/en/") {
        return link.replacen("sports.bwin.com/en/", "sports.bwin.es/es/", 1);
    }
    if link.contains("sportswidget.versus.es/sports") {
        return link.replacen(
            "sportswidget.versus.es/sports",
            "www.versus.es/apuestas/sports",
            1,
        );
    }
    if link.contains("versus.es/sports") {
        return link.replacen("versus.es/sports", "www.versus.es/apuestas/sports", 1);
    }
    if link.contains("pokerstars.uk/") {
        return link.replacen("pokerstars.uk/", "pokerstars.es/", 1);
    }
    link.to_string()
}

fn uppercase_path_after(link: &str, marker: &str) -> String {
    match link.find(marker) {
        Some(idx) => {
            let split_at = idx + marker.len();
            let (head, tail) = link.split_at(split_at);
            format!("{head}{}", tail.to_uppercase())
        }
        None => link.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculation::StakeTier;

    #[test]
    fn rewrites_bet365_domain_and_uppercases_path() {
        let got = rewrite_domain("https://bet365.com/dl/sport/foo?bar=1");
        assert_eq!(got, "https://bet365.es/DL/SPORT/FOO?BAR=1");
    }

    #[test]
    fn rewrites_betway_domain() {
        let got = rewrite_domain("https://sports.betway.com/en/sports/1/football");
        assert_eq!(got, "https://sports.betway.es/es/sports/1/football");
    }

    #[test]
    fn leaves_unmatched_domains_untouched() {
        let got = rewrite_domain("https://example.com/foo");
        assert_eq!(got, "https://example.com/foo");
    }

    #[test]
    fn clean_text_strips_stopwords_and_applies_replacements() {
        let got = clean_text("Total Goals Over _1x Match");
        assert_eq!(got, "over 1x");
    }

    #[test]
    fn escape_html_covers_ampersand_and_angle_brackets() {
        assert_eq!(escape_html("<a & b>"), "&lt;a &amp; b&gt;");
    }

    #[tokio::test]
    async fn format_combines_static_and_dynamic_parts() {
        let cache = Arc::new(LocalCache::new(100));
        let formatter = MessageFormatter::new(cache);
        let pick = Pick {
            teams: ("Fnatic".into(), "G2".into()),
            event_time_ms: crate::util::now_ms() + 3_600_000,
            tournament: "LEC".into(),
            sport_id: "leagueoflegends".into(),
            link: Some("https://bet365.com/dl/sport/foo".into()),
            soft_bookmaker: "retabet_apuestas".into(),
            soft_odds: 2.05,
            market: crate::domain::MarketType::new("under"),
            variety: "2.5".into(),
            channel_id: -1002294438792,
            sharp_bookmaker: "pinnaclesports".into(),
            sharp_odds: 2.10,
            profit: 2.5,
        };
        let calc = Calculation {
            stake_tier: Some(StakeTier::MediumHigh),
            min_odds: 1.92,
        };
        let msg = formatter.format(&pick, &calc).await;
        assert!(msg.contains("Fnatic"));
        assert!(msg.contains("UNDER 2.5"));
        assert!(msg.contains("bet365.es"));
    }
}
