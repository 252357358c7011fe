//! Trip and conversation data supplied by the planning UI at export time.
//!
//! Field names on the wire follow the planning-assistant backend
//! (`destino`, `pregunta`, `respuesta`, ...) so a conversation captured from
//! it can be exported without any mapping layer. In Rust the types use
//! English names.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The four answers of the initial trip form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripRequest {
    #[serde(rename = "destino")]
    pub destination: String,
    #[serde(rename = "fecha")]
    pub date: String,
    #[serde(rename = "presupuesto")]
    pub budget: Budget,
    #[serde(rename = "preferencia")]
    pub preference: Preference,
}

impl TripRequest {
    pub fn new(
        destination: impl Into<String>,
        date: impl Into<String>,
        budget: Budget,
        preference: Preference,
    ) -> Self {
        Self {
            destination: destination.into(),
            date: date.into(),
            budget,
            preference,
        }
    }
}

/// Approximate trip budget, as offered by the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Budget {
    #[serde(rename = "economico")]
    Economic,
    #[serde(rename = "medio")]
    Mid,
    #[serde(rename = "alto")]
    High,
    #[serde(rename = "premium")]
    Premium,
}

impl Budget {
    /// Label shown in the selections block of the document.
    pub fn label(self) -> &'static str {
        match self {
            Budget::Economic => "Económico (menos de $500)",
            Budget::Mid => "Medio ($500 - $1,500)",
            Budget::High => "Alto ($1,500 - $3,000)",
            Budget::Premium => "Premium (más de $3,000)",
        }
    }

    /// Wire value, also used in the automatic first question.
    pub fn as_str(self) -> &'static str {
        match self {
            Budget::Economic => "economico",
            Budget::Mid => "medio",
            Budget::High => "alto",
            Budget::Premium => "premium",
        }
    }
}

impl fmt::Display for Budget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of trip the traveller prefers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Preference {
    #[serde(rename = "aventura")]
    Adventure,
    #[serde(rename = "relajacion")]
    Relaxation,
    #[serde(rename = "cultura")]
    Culture,
}

impl Preference {
    pub fn label(self) -> &'static str {
        match self {
            Preference::Adventure => "Aventura",
            Preference::Relaxation => "Relajación",
            Preference::Culture => "Cultura",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Preference::Adventure => "aventura",
            Preference::Relaxation => "relajacion",
            Preference::Culture => "cultura",
        }
    }
}

impl fmt::Display for Preference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One question/answer exchange with the assistant.
///
/// The first turn of a history is the primary itinerary; every later turn
/// goes to the numbered appendix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    #[serde(rename = "pregunta")]
    pub question: String,
    #[serde(rename = "respuesta")]
    pub answer: String,
    #[serde(rename = "fecha", default)]
    pub timestamp: String,
}

impl ConversationTurn {
    pub fn new(
        question: impl Into<String>,
        answer: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
            timestamp: timestamp.into(),
        }
    }
}

/// A remote destination photo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoRef {
    pub url: String,
    #[serde(rename = "descripcion", default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

impl PhotoRef {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            caption: None,
        }
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }
}

/// Live destination facts the assistant returns next to its answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SidePanel {
    #[serde(rename = "temperatura")]
    pub temperature: f64,
    #[serde(rename = "descripcion_clima")]
    pub weather_description: String,
    #[serde(rename = "diferencia_horaria")]
    pub timezone_offset_hours: f64,
    #[serde(rename = "tipo_cambio", default, skip_serializing_if = "Option::is_none")]
    pub exchange_rate: Option<ExchangeRate>,
    #[serde(rename = "moneda", default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(rename = "ciudad", default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(rename = "pais", default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRate {
    #[serde(rename = "tasa_cambio")]
    pub rate: f64,
}

/// Everything one export reads: an immutable snapshot of the session.
///
/// Serialised form is the CLI input file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripExport {
    #[serde(rename = "datosViaje")]
    pub trip: TripRequest,
    #[serde(rename = "historial", default)]
    pub history: Vec<ConversationTurn>,
    #[serde(rename = "fotos", default)]
    pub photos: Vec<PhotoRef>,
}
