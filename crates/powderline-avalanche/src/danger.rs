//! Avalanche danger ratings and elevation bands.

use serde::{Deserialize, Serialize};

/// North American public avalanche danger scale.
///
/// `NoRating` sorts below `Low` so that `max()` over bands picks the worst
/// published rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DangerRating {
    NoRating,
    Low,
    Moderate,
    Considerable,
    High,
    Extreme,
}

impl DangerRating {
    /// Parse an API value or display string.
    ///
    /// Accepts `considerable`, `3 - Considerable`, `3`, and the French display
    /// names. Returns `None` for text that is not a rating at all.
    pub fn parse(input: &str) -> Option<Self> {
        let s = input.trim().to_lowercase();
        if s.is_empty() {
            return Some(Self::NoRating);
        }

        let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
        if !digits.is_empty() {
            return digits.parse().ok().and_then(Self::from_level);
        }

        let word: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
            .collect();
        match word.as_str() {
            "low" | "faible" => Some(Self::Low),
            "moderate" | "modéré" | "modere" => Some(Self::Moderate),
            "considerable" | "considérable" => Some(Self::Considerable),
            "high" | "élevé" | "eleve" => Some(Self::High),
            "extreme" | "extrême" => Some(Self::Extreme),
            "norating" | "noforecast" | "earlyseason" | "spring" | "n/a" => Some(Self::NoRating),
            _ => None,
        }
    }

    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            1 => Some(Self::Low),
            2 => Some(Self::Moderate),
            3 => Some(Self::Considerable),
            4 => Some(Self::High),
            5 => Some(Self::Extreme),
            _ => None,
        }
    }

    /// 1-5, or 0 when there is no rating.
    pub fn level(&self) -> u8 {
        match self {
            Self::NoRating => 0,
            Self::Low => 1,
            Self::Moderate => 2,
            Self::Considerable => 3,
            Self::High => 4,
            Self::Extreme => 5,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::NoRating => "No Rating",
            Self::Low => "Low",
            Self::Moderate => "Moderate",
            Self::Considerable => "Considerable",
            Self::High => "High",
            Self::Extreme => "Extreme",
        }
    }

    /// Hex colour used on Avalanche Canada danger graphics.
    pub fn color(&self) -> &'static str {
        match self {
            Self::NoRating => "#FFFFFF",
            Self::Low => "#52BA4A",
            Self::Moderate => "#FFF300",
            Self::Considerable => "#F79218",
            Self::High => "#EF1C29",
            Self::Extreme => "#1A1A1A",
        }
    }

    pub fn is_rated(&self) -> bool {
        !matches!(self, Self::NoRating)
    }
}

impl std::fmt::Display for DangerRating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_rated() {
            write!(f, "{} - {}", self.level(), self.label())
        } else {
            f.write_str(self.label())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElevationBand {
    Alpine,
    Treeline,
    BelowTreeline,
}

impl ElevationBand {
    pub const ALL: [ElevationBand; 3] = [Self::Alpine, Self::Treeline, Self::BelowTreeline];

    /// From the `alp` / `tln` / `btl` keys used by the API.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_lowercase().as_str() {
            "alp" | "alpine" => Some(Self::Alpine),
            "tln" | "treeline" => Some(Self::Treeline),
            "btl" | "belowtreeline" | "below treeline" => Some(Self::BelowTreeline),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Alpine => "alp",
            Self::Treeline => "tln",
            Self::BelowTreeline => "btl",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Alpine => "Alpine",
            Self::Treeline => "Treeline",
            Self::BelowTreeline => "Below Treeline",
        }
    }
}

/// Ratings for one forecast day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayRatings {
    pub date: Option<chrono::NaiveDate>,
    /// Day name as published, e.g. "Monday"
    pub label: String,
    pub alpine: DangerRating,
    pub treeline: DangerRating,
    pub below_treeline: DangerRating,
}

impl DayRatings {
    pub fn rating(&self, band: ElevationBand) -> DangerRating {
        match band {
            ElevationBand::Alpine => self.alpine,
            ElevationBand::Treeline => self.treeline,
            ElevationBand::BelowTreeline => self.below_treeline,
        }
    }

    /// Worst rating across the three bands.
    pub fn highest(&self) -> DangerRating {
        ElevationBand::ALL
            .iter()
            .map(|b| self.rating(*b))
            .max()
            .unwrap_or(DangerRating::NoRating)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_api_values() {
        assert_eq!(DangerRating::parse("low"), Some(DangerRating::Low));
        assert_eq!(DangerRating::parse("considerable"), Some(DangerRating::Considerable));
        assert_eq!(DangerRating::parse("  HIGH "), Some(DangerRating::High));
        assert_eq!(DangerRating::parse("Extreme"), Some(DangerRating::Extreme));
    }

    #[test]
    fn test_parse_display_text_and_numbers() {
        assert_eq!(DangerRating::parse("3 - Considerable"), Some(DangerRating::Considerable));
        assert_eq!(DangerRating::parse("2 - Modéré"), Some(DangerRating::Moderate));
        assert_eq!(DangerRating::parse("4"), Some(DangerRating::High));
        assert_eq!(DangerRating::parse("0"), None);
        assert_eq!(DangerRating::parse("9 - Apocalyptic"), None);
    }

    #[test]
    fn test_parse_no_rating_variants() {
        for s in ["noRating", "No Rating", "noForecast", "earlySeason", "spring", "", "  "] {
            assert_eq!(DangerRating::parse(s), Some(DangerRating::NoRating), "{:?}", s);
        }
    }

    #[test]
    fn test_parse_unknown_word() {
        assert_eq!(DangerRating::parse("spicy"), None);
    }

    #[test]
    fn test_ordering_and_levels() {
        assert!(DangerRating::NoRating < DangerRating::Low);
        assert!(DangerRating::High > DangerRating::Considerable);
        assert_eq!(DangerRating::Moderate.level(), 2);
        assert_eq!(DangerRating::NoRating.level(), 0);
        assert_eq!(DangerRating::Considerable.to_string(), "3 - Considerable");
        assert_eq!(DangerRating::NoRating.to_string(), "No Rating");
        assert_eq!(DangerRating::Low.color(), "#52BA4A");
    }

    #[test]
    fn test_band_codes() {
        for band in ElevationBand::ALL {
            assert_eq!(ElevationBand::from_code(band.code()), Some(band));
        }
        assert_eq!(ElevationBand::from_code("nope"), None);
    }

    #[test]
    fn test_highest_rating() {
        let day = DayRatings {
            date: None,
            label: "Today".into(),
            alpine: DangerRating::Considerable,
            treeline: DangerRating::High,
            below_treeline: DangerRating::NoRating,
        };
        assert_eq!(day.highest(), DangerRating::High);
        assert_eq!(day.rating(ElevationBand::BelowTreeline), DangerRating::NoRating);
    }
}
