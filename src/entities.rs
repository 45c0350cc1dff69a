//! Typed entity values recovered from recognizer text.
//!
//! Synonym tables cover pt-PT and English. Anything not in a table stays raw
//! text and is left to the consuming capability.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Compass and relative directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    North,
    South,
    East,
    West,
    Left,
    Right,
    Up,
    Down,
}

impl Direction {
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let direction = match normalize(value).as_str() {
            "north" | "norte" | "para norte" => Self::North,
            "south" | "sul" | "para sul" => Self::South,
            "east" | "este" | "leste" | "para este" => Self::East,
            "west" | "oeste" | "para oeste" => Self::West,
            "left" | "esquerda" | "à esquerda" | "para a esquerda" => Self::Left,
            "right" | "direita" | "à direita" | "para a direita" => Self::Right,
            "up" | "cima" | "para cima" | "acima" => Self::Up,
            "down" | "baixo" | "para baixo" | "abaixo" => Self::Down,
            _ => return None,
        };
        Some(direction)
    }
}

/// Travel modes offered by the directions panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransportMode {
    Driving,
    Walking,
    Transit,
    Cycling,
    TwoWheeler,
}

impl TransportMode {
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let mode = match normalize(value).as_str() {
            "driving" | "drive" | "car" | "auto" | "vehicle" | "carro" | "conduzir"
            | "automóvel" | "viatura" | "de carro" => Self::Driving,
            "walking" | "walk" | "on foot" | "foot" | "a pé" | "andar" | "caminhar" => {
                Self::Walking
            }
            "transit" | "public transport" | "public transportation" | "bus" | "train"
            | "metro" | "subway" | "transportes públicos" | "transportes" | "autocarro"
            | "comboio" | "trem" => Self::Transit,
            "cycling" | "bike" | "bicycle" | "biking" | "bicicleta" | "bici" | "ciclismo" => {
                Self::Cycling
            }
            "two-wheeler" | "motorcycle" | "scooter" | "mota" | "motociclo" => Self::TwoWheeler,
            _ => return None,
        };
        Some(mode)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Driving => "driving",
            Self::Walking => "walking",
            Self::Transit => "transit",
            Self::Cycling => "cycling",
            Self::TwoWheeler => "two-wheeler",
        }
    }
}

/// Map layer shown by the map view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MapType {
    Default,
    Satellite,
    Terrain,
    Traffic,
}

impl MapType {
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let map_type = match normalize(value).as_str() {
            "default" | "map" | "normal" | "standard" | "padrão" | "mapa" => Self::Default,
            "satellite" | "sat" | "aerial" | "satélite" => Self::Satellite,
            "terrain" | "topographic" | "topo" | "terreno" | "relevo" => Self::Terrain,
            "traffic" | "trânsito" | "tráfego" => Self::Traffic,
            _ => return None,
        };
        Some(map_type)
    }
}

/// How far a zoom command should go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoomLevel {
    Little,
    Normal,
    Lot,
}

impl ZoomLevel {
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let level = match normalize(value).as_str() {
            "a little" | "little" | "slightly" | "bit" | "um pouco" | "pouco"
            | "ligeiramente" => Self::Little,
            "normal" | "medium" => Self::Normal,
            "a lot" | "lot" | "much" | "very" | "muito" | "bastante" => Self::Lot,
            _ => return None,
        };
        Some(level)
    }

    /// Number of zoom steps the automation layer should apply.
    #[must_use]
    pub fn steps(self) -> u32 {
        match self {
            Self::Little => 1,
            Self::Normal => 2,
            Self::Lot => 3,
        }
    }
}

/// Parse an ordinal word or numeral into a 1-based rank.
///
/// Accepts digits (`"2"`, `"2º"`, `"2nd"`), pt-PT ordinals in both genders
/// and English ordinals up to ten.
#[must_use]
pub fn parse_ordinal(value: &str) -> Option<u32> {
    let text = normalize(value);
    let digits: String = text.chars().take_while(char::is_ascii_digit).collect();
    if !digits.is_empty() {
        let suffix = &text[digits.len()..];
        let known_suffix = matches!(
            suffix,
            "" | "º" | "ª" | "o" | "a" | "st" | "nd" | "rd" | "th" | "."
        );
        return match digits.parse::<u32>() {
            Ok(rank) if rank > 0 && known_suffix => Some(rank),
            _ => None,
        };
    }
    let rank = match text.as_str() {
        "primeiro" | "primeira" | "first" | "um" | "uma" | "one" => 1,
        "segundo" | "segunda" | "second" | "dois" | "duas" | "two" => 2,
        "terceiro" | "terceira" | "third" | "três" | "three" => 3,
        "quarto" | "quarta" | "fourth" | "quatro" | "four" => 4,
        "quinto" | "quinta" | "fifth" | "cinco" | "five" => 5,
        "sexto" | "sexta" | "sixth" | "seis" | "six" => 6,
        "sétimo" | "sétima" | "seventh" | "sete" | "seven" => 7,
        "oitavo" | "oitava" | "eighth" | "oito" | "eight" => 8,
        "nono" | "nona" | "ninth" | "nove" | "nine" => 9,
        "décimo" | "décima" | "tenth" | "dez" | "ten" => 10,
        _ => return None,
    };
    Some(rank)
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Value of one entity after normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum EntityValue {
    Ordinal(u32),
    Direction(Direction),
    TransportMode(TransportMode),
    MapType(MapType),
    Zoom(ZoomLevel),
    Text(String),
}

impl EntityValue {
    /// Type an entity by its name, falling back to raw text.
    #[must_use]
    pub fn from_named(name: &str, raw: &str) -> Self {
        let typed = match name {
            "ordinal" | "position" | "number" | "rank" => parse_ordinal(raw).map(Self::Ordinal),
            "direction" => Direction::parse(raw).map(Self::Direction),
            "transport_mode" | "transport" | "mode" => {
                TransportMode::parse(raw).map(Self::TransportMode)
            }
            "map_type" => MapType::parse(raw).map(Self::MapType),
            "zoom_level" | "zoom_amount" | "amount" => ZoomLevel::parse(raw).map(Self::Zoom),
            _ => None,
        };
        typed.unwrap_or_else(|| Self::Text(raw.trim().to_owned()))
    }

    #[must_use]
    pub fn as_ordinal(&self) -> Option<u32> {
        match self {
            Self::Ordinal(rank) => Some(*rank),
            _ => None,
        }
    }
}

impl fmt::Display for EntityValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ordinal(rank) => write!(f, "{rank}"),
            Self::Direction(d) => write!(f, "{d:?}"),
            Self::TransportMode(mode) => f.write_str(mode.as_str()),
            Self::MapType(t) => write!(f, "{t:?}"),
            Self::Zoom(level) => write!(f, "{level:?}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}
