// 💲 Presentation scaling for currency amounts
//
// Only the CLI, the server and exports scale; the core always works in raw
// currency units.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scale {
    Raw,
    Thousands,
    Millions,
    Billions,
}

impl Scale {
    /// Largest first, for `for_amount`
    const DESCENDING: [Scale; 4] = [Scale::Billions, Scale::Millions, Scale::Thousands, Scale::Raw];

    pub fn factor(&self) -> f64 {
        match self {
            Scale::Raw => 1.0,
            Scale::Thousands => 1e3,
            Scale::Millions => 1e6,
            Scale::Billions => 1e9,
        }
    }

    pub fn suffix(&self) -> &'static str {
        match self {
            Scale::Raw => "",
            Scale::Thousands => "K",
            Scale::Millions => "M",
            Scale::Billions => "B",
        }
    }

    pub fn apply(&self, amount: f64) -> f64 {
        amount / self.factor()
    }

    /// "$1.2B", "-$350.0M", "$12.50"
    pub fn format(&self, amount: f64) -> String {
        let scaled = self.apply(amount);
        let sign = if scaled < 0.0 { "-" } else { "" };
        match self {
            Scale::Raw => format!("{}${:.2}", sign, scaled.abs()),
            _ => format!("{}${:.1}{}", sign, scaled.abs(), self.suffix()),
        }
    }

    /// Largest scale that keeps `max` at or above 1
    pub fn for_amount(max: f64) -> Scale {
        let magnitude = max.abs();
        Self::DESCENDING
            .into_iter()
            .find(|s| magnitude >= s.factor())
            .unwrap_or(Scale::Raw)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scale::Raw => "raw",
            Scale::Thousands => "thousands",
            Scale::Millions => "millions",
            Scale::Billions => "billions",
        }
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "raw" | "1" => Ok(Scale::Raw),
            "thousands" | "k" => Ok(Scale::Thousands),
            "millions" | "m" => Ok(Scale::Millions),
            "billions" | "b" => Ok(Scale::Billions),
            other => Err(format!("unknown scale '{}' (raw, thousands, millions, billions)", other)),
        }
    }
}
