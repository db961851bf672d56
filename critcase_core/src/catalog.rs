//! Default catalog of rare-disease cases.
//!
//! Each case carries its required treatment protocol, the clue revealed by a
//! diagnostic scan and the candidate diagnoses shown in the database panel.

use crate::rng::GameRng;
use crate::types::*;
use crate::{Error, Result};
use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Cached default catalog - built once and reused across all sessions
static DEFAULT_CATALOG: Lazy<Catalog> = Lazy::new(build_default_catalog_internal);

/// Get a reference to the cached default catalog
pub fn get_default_catalog() -> &'static Catalog {
    &DEFAULT_CATALOG
}

/// Builds the default catalog
///
/// **Note**: For production use, prefer `get_default_catalog()` which returns a
/// cached reference. This function is retained for tests that tweak cases.
pub fn build_default_catalog() -> Catalog {
    build_default_catalog_internal()
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

fn build_default_catalog_internal() -> Catalog {
    use TreatmentKind::*;

    let cases = vec![
        CaseDefinition {
            id: "malignant_hyperthermia".into(),
            name: "Malignant Hyperthermia".into(),
            required_sequence: vec![Scan, Iv, Iv, Oral],
            scan_clue: "Patient temperature spiking rapidly. Muscle rigidity observed. CO2 levels critical.".into(),
            failure_message: "Protocol deviation. Patient temperature uncontrolled. CONSULT HANDBOOK.".into(),
            databases: vec![
                DistractorEntry {
                    disease: "Malignant Hyperthermia".into(),
                    symptoms: strings(&["Rapid temp spike", "Muscle rigidity", "High CO2"]),
                    cure: "IV Dantrolene x2, then Oral Cooling".into(),
                    notes: "Genetic disorder triggered by anesthetics.".into(),
                    highlighted: true,
                },
                DistractorEntry {
                    disease: "Thyroid Storm".into(),
                    symptoms: strings(&["High fever", "Tachycardia", "Altered mental status"]),
                    cure: "Beta blockers, Fluids, Steroids".into(),
                    notes: "Consider if history of hyperthyroidism.".into(),
                    highlighted: false,
                },
                DistractorEntry {
                    disease: "Severe Sepsis".into(),
                    symptoms: strings(&["Fever", "Low BP", "Elevated lactate"]),
                    cure: "IV Antibiotics, Fluids".into(),
                    notes: "Source control critical.".into(),
                    highlighted: false,
                },
            ],
        },
        CaseDefinition {
            id: "anaphylaxis".into(),
            name: "Anaphylaxis".into(),
            required_sequence: vec![Scan, InjectionB, InjectionB, Oral],
            scan_clue: "Airway constricting. BP dropping. Skin reaction visible.".into(),
            failure_message: "Airway closed completely due to incorrect intervention. CONSULT HANDBOOK.".into(),
            databases: vec![
                DistractorEntry {
                    disease: "Severe Anaphylaxis".into(),
                    symptoms: strings(&["Airway constriction", "Hypotension", "Urticaria"]),
                    cure: "Injection B (Epinephrine) x2, then Oral Antihistamine".into(),
                    notes: "Administer Epi immediately. Time critical.".into(),
                    highlighted: true,
                },
                DistractorEntry {
                    disease: "Acute Asthma Attack".into(),
                    symptoms: strings(&["Wheezing", "Shortness of breath", "Chest tightness"]),
                    cure: "Bronchodilators, Steroids".into(),
                    notes: "No skin involvement typically.".into(),
                    highlighted: false,
                },
                DistractorEntry {
                    disease: "Panic Disorder".into(),
                    symptoms: strings(&["Hyperventilation", "Palpitations", "Dizziness"]),
                    cure: "Reassurance, Anxiolytics".into(),
                    notes: "Diagnosis of exclusion.".into(),
                    highlighted: false,
                },
            ],
        },
        CaseDefinition {
            id: "thyroid_storm".into(),
            name: "Thyroid Storm".into(),
            required_sequence: vec![Scan, Oral, Iv, InjectionA],
            scan_clue: "Heart rate > 180. Fever. Delirium present.".into(),
            failure_message: "Cardiac failure due to untreated metabolic surge. CONSULT HANDBOOK.".into(),
            databases: vec![
                DistractorEntry {
                    disease: "Thyroid Storm".into(),
                    symptoms: strings(&["HR > 180", "High Fever", "Delirium"]),
                    cure: "Oral Beta-Blocker, IV Fluids, Injection A (Steroids)".into(),
                    notes: "Multi-organ failure risk. History of hyperthyroidism.".into(),
                    highlighted: true,
                },
                DistractorEntry {
                    disease: "Stimulant Overdose".into(),
                    symptoms: strings(&["Tachycardia", "Agitation", "Hyperthermia"]),
                    cure: "Benzodiazepines, Supportive care".into(),
                    notes: "Check for drug use history.".into(),
                    highlighted: false,
                },
                DistractorEntry {
                    disease: "Heat Stroke".into(),
                    symptoms: strings(&["High temp", "Altered consciousness", "Dry skin"]),
                    cure: "Rapid cooling, IV Fluids".into(),
                    notes: "Environmental exposure history.".into(),
                    highlighted: false,
                },
            ],
        },
        CaseDefinition {
            id: "warfarin_toxicity".into(),
            name: "Warfarin Toxicity".into(),
            required_sequence: vec![Scan, InjectionA, InjectionA, Oral],
            scan_clue: "Uncontrolled bleeding. INR > 9.0. History of blood thinners.".into(),
            failure_message: "Hemorrhage fatal. Clotting factors not administered. CONSULT HANDBOOK.".into(),
            databases: vec![
                DistractorEntry {
                    disease: "Warfarin Toxicity".into(),
                    symptoms: strings(&["Uncontrolled Bleeding", "INR > 9.0", "Bruising"]),
                    cure: "Injection A (Vitamin K) x2, then Oral Plasma".into(),
                    notes: "Immediate reversal required for active bleeding.".into(),
                    highlighted: true,
                },
                DistractorEntry {
                    disease: "Liver Failure".into(),
                    symptoms: strings(&["Coagulopathy", "Jaundice", "Encephalopathy"]),
                    cure: "Supportive care, Transplant evaluation".into(),
                    notes: "Check liver function tests.".into(),
                    highlighted: false,
                },
                DistractorEntry {
                    disease: "Disseminated Intravascular Coagulation".into(),
                    symptoms: strings(&["Bleeding", "Clotting", "Low platelets"]),
                    cure: "Treat underlying cause, Supportive".into(),
                    notes: "Complex coagulation disorder.".into(),
                    highlighted: false,
                },
            ],
        },
        CaseDefinition {
            id: "metallergy_syndrome".into(),
            name: "Metallergy Syndrome".into(),
            required_sequence: vec![Scan, Oral, Oral, Iv],
            scan_clue: "Rare autoimmune reaction to synthetic metals. Hives near implants.".into(),
            failure_message: "Systemic shock from metal exposure. Injections worsened condition. CONSULT HANDBOOK.".into(),
            databases: vec![
                DistractorEntry {
                    disease: "Metallergy Syndrome".into(),
                    symptoms: strings(&["Metal allergy", "Hives near implants", "Systemic reaction"]),
                    cure: "Oral Chelation x2, then IV Flush".into(),
                    notes: "Do NOT use metallic needles (Injections).".into(),
                    highlighted: true,
                },
                DistractorEntry {
                    disease: "Contact Dermatitis".into(),
                    symptoms: strings(&["Localized rash", "Itching", "Redness"]),
                    cure: "Topical steroids, Avoidance".into(),
                    notes: "Usually localized, not systemic.".into(),
                    highlighted: false,
                },
                DistractorEntry {
                    disease: "Implant Infection".into(),
                    symptoms: strings(&["Fever", "Pain at site", "Swelling"]),
                    cure: "Antibiotics, Possible removal".into(),
                    notes: "Look for signs of infection.".into(),
                    highlighted: false,
                },
            ],
        },
    ];

    Catalog { cases }
}

impl Catalog {
    /// Look up a case by id
    pub fn get(&self, id: &str) -> Option<&CaseDefinition> {
        self.cases.iter().find(|c| c.id == id)
    }

    /// Draw a case uniformly at random
    pub fn select_random_case(&self, rng: &mut GameRng) -> Result<&CaseDefinition> {
        rng.choose(&self.cases)
            .ok_or_else(|| Error::CatalogValidation("Catalog has no cases".into()))
    }

    /// Validate the catalog for consistency and completeness
    ///
    /// Returns a list of validation errors, or empty Vec if valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let mut seen_ids = HashSet::new();

        if self.cases.is_empty() {
            errors.push("Catalog has no cases".to_string());
        }

        for case in &self.cases {
            let id = &case.id;
            if id.is_empty() {
                errors.push("Case has empty ID".to_string());
            }
            if !seen_ids.insert(id.as_str()) {
                errors.push(format!("Duplicate case ID '{}'", id));
            }
            if case.name.is_empty() {
                errors.push(format!("Case '{}' has empty name", id));
            }

            match case.required_sequence.first() {
                None => errors.push(format!("Case '{}' has an empty protocol", id)),
                Some(TreatmentKind::Scan) => {}
                Some(first) => errors.push(format!(
                    "Case '{}' protocol starts with '{}' instead of a scan",
                    id, first
                )),
            }

            if case.databases.is_empty() {
                errors.push(format!("Case '{}' has no database entries", id));
            }

            let highlighted = case.databases.iter().filter(|e| e.highlighted).count();
            if highlighted != 1 {
                errors.push(format!(
                    "Case '{}' must highlight exactly one diagnosis, found {}",
                    id, highlighted
                ));
            }
        }

        errors
    }
}
