/* Copyright (C) 2022 Antmicro
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     https://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use std::collections::BTreeMap;
use std::convert::TryFrom;
use std::str::FromStr;
use serde::{Serialize, Deserialize};

/* Switchblock sides. The order is the one used for keys in the connection map. */
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Top,
    Right,
    Bottom,
    Left,
}

impl Side {
    pub const SIDES: [Side; 4] = [Side::Top, Side::Right, Side::Bottom, Side::Left];

    pub fn code(self) -> char {
        match self {
            Side::Top => 't',
            Side::Right => 'r',
            Side::Bottom => 'b',
            Side::Left => 'l',
        }
    }

    pub fn from_code(ch: char) -> Option<Self> {
        match ch {
            't' => Some(Side::Top),
            'r' => Some(Side::Right),
            'b' => Some(Side::Bottom),
            'l' => Some(Side::Left),
            _ => None,
        }
    }

    /* Left and bottom sides observe a wire one phase later than right and top */
    pub fn is_low(self) -> bool {
        matches!(self, Side::Left | Side::Bottom)
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Side::Top => "top",
            Side::Right => "right",
            Side::Bottom => "bottom",
            Side::Left => "left",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Side {
    type Err = String;

    /* Accepts both the full name and the one-letter code */
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        let mut chars = lower.chars();
        match (chars.next(), chars.next()) {
            (Some(ch), None) => Side::from_code(ch),
            _ => match lower.as_str() {
                "top" => Some(Side::Top),
                "right" => Some(Side::Right),
                "bottom" => Some(Side::Bottom),
                "left" => Some(Side::Left),
                _ => None,
            },
        }
        .ok_or_else(|| format!("Unknown switchblock side \"{}\"", s))
    }
}

/// An ordered pair of distinct switchblock sides. Serialized as a two-letter
/// code, e.g. `"lt"` for left-to-top.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SidePair {
    pub from: Side,
    pub to: Side,
}

impl SidePair {
    pub fn new(from: Side, to: Side) -> Option<Self> {
        if from == to {
            return None;
        }
        Some(Self { from, to })
    }

    pub fn reversed(self) -> Self {
        Self { from: self.to, to: self.from }
    }
}

impl std::fmt::Display for SidePair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.from.code(), self.to.code())
    }
}

impl FromStr for SidePair {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let codes: Vec<char> = s.trim().to_ascii_lowercase().chars().collect();
        if codes.len() != 2 {
            return Err(format!("Side pair \"{}\" must consist of two side letters", s));
        }
        let from = Side::from_code(codes[0])
            .ok_or_else(|| format!("Unknown side '{}' in \"{}\"", codes[0], s))?;
        let to = Side::from_code(codes[1])
            .ok_or_else(|| format!("Unknown side '{}' in \"{}\"", codes[1], s))?;
        SidePair::new(from, to)
            .ok_or_else(|| format!("Side pair \"{}\" connects a side to itself", s))
    }
}

impl TryFrom<String> for SidePair {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<SidePair> for String {
    fn from(pair: SidePair) -> Self {
        pair.to_string()
    }
}

#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Directionality {
    Bidirectional,
    Unidirectional,
}

impl Directionality {
    /* Unidirectional wires come in INC/DEC pairs */
    pub fn dir_factor(self) -> usize {
        match self {
            Directionality::Bidirectional => 1,
            Directionality::Unidirectional => 2,
        }
    }
}

impl std::fmt::Display for Directionality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Directionality::Bidirectional => write!(f, "bidirectional"),
            Directionality::Unidirectional => write!(f, "unidirectional"),
        }
    }
}

/* Direction in which a single track is driven */
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Bi,
    Inc,
    Dec,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireTypeInfo {
    pub name: String,
    pub length: usize,
    #[serde(default = "default_frequency")]
    pub frequency: usize,
}

fn default_frequency() -> usize {
    1
}

/// A single `wireconn` rule of a switchblock. Wirepoint lists set to `None`
/// select every wirepoint of the listed types.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireconnInfo {
    pub from_type: Vec<String>,
    pub to_type: Vec<String>,
    #[serde(default)]
    pub from_points: Option<Vec<usize>>,
    #[serde(default)]
    pub to_points: Option<Vec<usize>>,
    #[serde(default)]
    pub switch_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchblockInfo {
    pub name: String,
    pub directionality: Directionality,
    pub switch_name: String,
    pub wireconns: Vec<WireconnInfo>,
    #[serde(default)]
    pub permutations: BTreeMap<SidePair, Vec<String>>,
}

impl SwitchblockInfo {
    pub fn permutation_funcs(&self, sides: SidePair) -> &[String] {
        self.permutations.get(&sides).map(Vec::as_slice).unwrap_or(&[])
    }
}

/* Logic tile grid size. Channels are laid out around it (see `channel`). */
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub width: usize,
    pub height: usize,
    pub channel_width: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Architecture {
    pub device: DeviceInfo,
    pub directionality: Directionality,
    pub wire_types: Vec<WireTypeInfo>,
    pub switchblocks: Vec<SwitchblockInfo>,
}
