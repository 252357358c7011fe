//! Fixed wording sent to the planning assistant or printed in the document.
//!
//! Centralising every string here means the Spanish copy can be reviewed in
//! one place and unit tests can inspect it without a backend.

use crate::model::TripRequest;

/// Heading of the selections block.
pub const SELECTIONS_HEADING: &str = "Opciones Seleccionadas por el Usuario";

/// Heading of the photo gallery.
pub const GALLERY_HEADING: &str = "Imágenes del Destino";

/// Heading of the primary itinerary.
pub const ITINERARY_HEADING: &str = "Resumen del Itinerario";

/// Heading of the follow-up appendix.
pub const APPENDIX_HEADING: &str = "Preguntas Adicionales";

/// Shown when the backend fails without an `error` field.
pub const GENERIC_FAILURE: &str = "No se pudo procesar la solicitud";

/// The question sent automatically once the trip form is complete.
///
/// Budget and preference use their wire values (`medio`, `cultura`), exactly
/// as the form submitted them.
pub fn initial_question(trip: &TripRequest) -> String {
    format!(
        "Quiero planificar un viaje a {} para {}. Mi presupuesto es {} y prefiero {}. \
         Por favor, ayúdame con recomendaciones detalladas.",
        trip.destination, trip.date, trip.budget, trip.preference
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Budget, Preference};

    #[test]
    fn initial_question_mentions_every_answer() {
        let trip = TripRequest::new("Kioto", "abril", Budget::High, Preference::Culture);
        assert_eq!(
            initial_question(&trip),
            "Quiero planificar un viaje a Kioto para abril. Mi presupuesto es alto \
             y prefiero cultura. Por favor, ayúdame con recomendaciones detalladas."
        );
    }
}
