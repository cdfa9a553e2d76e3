//! Plain-text rendering of reports and rankings.

use chrono::Utc;
use powderline_avalanche::{DangerRating, ElevationBand, ZoneForecast};
use powderline_roads::RankedEvent;
use powderline_services::{Cached, Freshness};
use powderline_weather::{DayForecast, Location, TemperatureUnit};

use crate::report::{PowderRanking, Report, Section, WeatherSummary};

/// Longest event description shown before truncation.
const DESCRIPTION_LIMIT: usize = 160;

pub fn render_report(report: &Report) -> String {
    let loc = &report.location;
    let mut lines = vec![
        format!("{} ({}, {})", loc.name, loc.region, loc.kind.label()),
        match loc.elevation_m {
            Some(e) => format!("{} | {:.0} m", loc.coordinates, e),
            None => loc.coordinates.to_string(),
        },
        String::new(),
    ];

    lines.push(heading("WEATHER", &report.weather));
    lines.extend(section_lines(&report.weather, weather_lines));
    lines.push(String::new());

    lines.push(heading("AVALANCHE", &report.avalanche));
    lines.extend(section_lines(&report.avalanche, avalanche_lines));
    lines.push(String::new());

    lines.push(heading("ROADS", &report.roads));
    lines.extend(section_lines(&report.roads, |events| road_lines(events)));

    lines.join("\n")
}

pub fn render_ranking(ranking: &PowderRanking) -> String {
    let mut lines = vec![format!(
        "{:<3} {:<28} {:>7} {:>7} {:<8} {}",
        "#", "Location", "Next24", "Past24", "Rating", "Best day"
    )];

    for (i, entry) in ranking.entries.iter().enumerate() {
        let best = entry
            .best_day
            .as_ref()
            .map(|d| {
                format!(
                    "{} ({:.1} cm, {:.1})",
                    d.date.format("%a %b %-d"),
                    d.snowfall_cm,
                    d.powder.score
                )
            })
            .unwrap_or_else(|| "-".to_string());
        let marker = if entry.powder.is_powder_day() { "*" } else { "" };
        let rating = format!("{:.1} {}", entry.powder.score, entry.powder.rating.label());
        lines.push(format!(
            "{:<3} {:<28} {:>5.1}cm {:>5.1}cm {:<8} {}{}",
            i + 1,
            truncate(&entry.location.name, 28),
            entry.powder.snowfall_cm,
            entry.snow_past_24h_cm,
            rating,
            best,
            marker
        ));
        if let Some(note) = freshness_note(&entry.freshness) {
            lines.push(format!("    {}", note));
        }
    }

    if !ranking.failures.is_empty() {
        lines.push(String::new());
        lines.push("Unavailable:".to_string());
        for failure in &ranking.failures {
            lines.push(format!("  {}: {}", failure.location.name, failure.message));
        }
    }

    lines.join("\n")
}

pub fn render_locations(locations: &[Location]) -> String {
    locations
        .iter()
        .map(|l| {
            format!(
                "{:<20} {:<28} {:<12} {:<20} Hwy {}",
                l.id,
                l.name,
                l.kind.label(),
                l.region,
                l.highways.join(", ")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn heading<T>(title: &str, section: &Section<T>) -> String {
    match section.freshness().and_then(freshness_note) {
        Some(note) => format!("{} {}", title, note),
        None => title.to_string(),
    }
}

fn freshness_note(freshness: &Freshness) -> Option<String> {
    match freshness {
        Freshness::Live | Freshness::Fresh { .. } => None,
        Freshness::Stale { age_secs, reason } => Some(format!(
            "(stale, {} old: {})",
            format_age(*age_secs),
            reason
        )),
    }
}

fn format_age(secs: u64) -> String {
    match secs {
        0..=59 => format!("{}s", secs),
        60..=3599 => format!("{} min", secs / 60),
        _ => format!("{} h", secs / 3600),
    }
}

fn section_lines<T>(section: &Section<T>, body: impl Fn(&T) -> Vec<String>) -> Vec<String> {
    match section {
        Section::Available(Cached { value, .. }) => body(value),
        Section::Unavailable { message, .. } => vec![format!("  {}", message)],
    }
}

fn temp(value: Option<f64>, unit: TemperatureUnit) -> String {
    match value {
        Some(t) => format!("{:.0}{}", t, unit.symbol()),
        None => "?".to_string(),
    }
}

fn weather_lines(w: &WeatherSummary) -> Vec<String> {
    let mut lines = Vec::new();

    if let Some(c) = &w.current {
        let mut now = format!(
            "  Now: {}, {}",
            temp(c.temperature, w.unit),
            c.condition.description()
        );
        if let Some(feels) = c.feels_like {
            now.push_str(&format!(", feels {}", temp(Some(feels), w.unit)));
        }
        if let Some(wind) = c.wind_speed {
            now.push_str(&format!(", wind {:.0} km/h", wind));
            if let Some(gusts) = c.wind_gusts {
                now.push_str(&format!(" gusting {:.0}", gusts));
            }
        }
        lines.push(now);
    }

    let mut snow = format!(
        "  Snow: {:.1} cm next 24 h, {:.1} cm past 24 h",
        w.snow_next_24h_cm, w.snow_past_24h_cm
    );
    if let Some(fl) = w.freezing_level_m {
        snow.push_str(&format!(", freezing level {:.0} m", fl));
    }
    lines.push(snow);

    lines.push(format!(
        "  Powder: {:.1}/10 {}{}",
        w.powder.score,
        w.powder.rating.label(),
        if w.powder.is_powder_day() { " - powder day!" } else { "" }
    ));

    if let Some(best) = &w.best_day {
        if best.powder.score > 0.0 {
            lines.push(format!(
                "  Best day: {} ({:.1} cm, {:.1}/10)",
                best.date.format("%a %b %-d"),
                best.snowfall_cm,
                best.powder.score
            ));
        }
    }

    for day in &w.days {
        lines.push(day_line(day, w.unit));
    }
    lines
}

fn day_line(day: &DayForecast, unit: TemperatureUnit) -> String {
    format!(
        "    {}  {:>5} / {:<5} {:>5.1} cm  {:<14} {:.1} {}",
        day.date.format("%a %m-%d"),
        temp(day.high, unit),
        temp(day.low, unit),
        day.snowfall_cm,
        day.condition.description(),
        day.powder.score,
        day.powder.rating.label()
    )
}

fn rating_cell(band: ElevationBand, rating: DangerRating) -> String {
    format!("{} {}", band.label(), rating)
}

fn avalanche_lines(z: &ZoneForecast) -> Vec<String> {
    let f = &z.forecast;
    let placement = if z.zone.inside {
        "inside region".to_string()
    } else {
        format!("{:.0} km from region centre", z.zone.distance_km)
    };
    let mut lines = vec![format!("  {} ({})", f.title, placement)];

    if let Some(issued) = f.issued {
        let mut line = format!("  Issued {}", issued.format("%Y-%m-%d %H:%M UTC"));
        if let Some(conf) = &f.confidence {
            line.push_str(&format!(", confidence {}", conf));
        }
        lines.push(line);
    }
    if let Some(until) = f.valid_until.filter(|_| f.is_expired_at(Utc::now())) {
        lines.push(format!(
            "  Expired {}, no newer forecast yet",
            until.format("%Y-%m-%d %H:%M UTC")
        ));
    }

    if f.days.is_empty() {
        lines.push("  No danger ratings published".to_string());
    }
    for day in &f.days {
        let cells: Vec<String> = ElevationBand::ALL
            .iter()
            .map(|b| rating_cell(*b, day.rating(*b)))
            .collect();
        let label = if day.label.is_empty() {
            day.date.map(|d| d.to_string()).unwrap_or_default()
        } else {
            day.label.clone()
        };
        lines.push(format!("  {:<10} {}", label, cells.join(" | ")));
    }

    for p in &f.problems {
        let bands: Vec<&str> = p.elevations.iter().map(|e| e.code()).collect();
        let mut line = format!("  Problem: {}", p.kind);
        if !bands.is_empty() {
            line.push_str(&format!(" [{}]", bands.join(", ")));
        }
        if !p.aspects.is_empty() {
            line.push_str(&format!(" aspects {}", p.aspects.join(" ")));
        }
        if let Some(likelihood) = &p.likelihood {
            line.push_str(&format!(", {}", likelihood.to_lowercase()));
        }
        lines.push(line);
    }

    if let Some(h) = &f.highlights {
        lines.push(format!("  {}", truncate(h, DESCRIPTION_LIMIT)));
    }
    lines
}

fn road_lines(events: &[RankedEvent]) -> Vec<String> {
    if events.is_empty() {
        return vec!["  No relevant road events".to_string()];
    }
    events
        .iter()
        .map(|r| {
            let e = &r.event;
            let tag = if e.closure { "[CLOSED] " } else { "" };
            let road = e.roads.first().map(String::as_str).unwrap_or("Unnamed road");
            let text = if e.description.is_empty() {
                e.headline.as_str()
            } else {
                e.description.as_str()
            };
            format!(
                "  {}{} - {} {}, {:.0} km: {}",
                tag,
                road,
                e.severity.label(),
                e.event_type.label().to_lowercase(),
                r.distance_km,
                truncate(text, DESCRIPTION_LIMIT)
            )
        })
        .collect()
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
