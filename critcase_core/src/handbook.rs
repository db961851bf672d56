//! Medical handbook.
//!
//! Reference entries for every disease that can appear in the database
//! panel: the curable cases list their full protocol, the distractors are
//! marked as not being game cases.

use once_cell::sync::Lazy;
use serde::Serialize;

#[derive(Clone, Debug, Serialize)]
pub struct HandbookEntry {
    pub name: &'static str,
    pub symptoms: &'static str,
    pub protocol: &'static str,
    pub medications: &'static str,
    pub alert: &'static str,
}

const NOT_A_CASE: &str = "Not a game case";

static HANDBOOK: Lazy<Vec<HandbookEntry>> = Lazy::new(|| {
    vec![
        HandbookEntry {
            name: "Malignant Hyperthermia",
            symptoms: "Rapid temp spike, Muscle rigidity, High CO2",
            protocol: "Scan -> IV -> IV -> Oral",
            medications: "IV Dantrolene (x2), then Oral Cooling agents",
            alert: "Avoid Volatile Anesthetics",
        },
        HandbookEntry {
            name: "Anaphylaxis",
            symptoms: "Airway constriction, Hypotension, Hives/Urticaria",
            protocol: "Scan -> Injection B -> Injection B -> Oral",
            medications: "Injection B Epinephrine (x2), then Oral Antihistamine",
            alert: "Time Critical - Airway Risk",
        },
        HandbookEntry {
            name: "Thyroid Storm",
            symptoms: "HR > 180, High Fever, Delirium/Agitation",
            protocol: "Scan -> Oral -> IV -> Injection A",
            medications: "Oral Beta-Blocker, IV Fluids, Injection A Steroids",
            alert: "Multi-organ Failure Risk",
        },
        HandbookEntry {
            name: "Warfarin Toxicity",
            symptoms: "Uncontrolled Bleeding, INR > 9.0, Bruising",
            protocol: "Scan -> Injection A -> Injection A -> Oral",
            medications: "Injection A Vitamin K (x2), then Oral Plasma",
            alert: "Hemorrhage Risk",
        },
        HandbookEntry {
            name: "Metallergy Syndrome",
            symptoms: "Autoimmune reaction to metal, Hives near implants, Systemic reaction",
            protocol: "Scan -> Oral -> Oral -> IV",
            medications: "Oral Chelation (x2), then IV Flush",
            alert: "Do NOT use Injections (metallic needles)",
        },
        HandbookEntry {
            name: "Severe Sepsis",
            symptoms: "Fever, Low BP, Elevated lactate",
            protocol: NOT_A_CASE,
            medications: "IV Antibiotics, Fluids",
            alert: "Source control critical",
        },
        HandbookEntry {
            name: "Acute Asthma Attack",
            symptoms: "Wheezing, Shortness of breath, Chest tightness",
            protocol: NOT_A_CASE,
            medications: "Bronchodilators, Steroids",
            alert: "No skin involvement typically",
        },
        HandbookEntry {
            name: "Panic Disorder",
            symptoms: "Hyperventilation, Palpitations, Dizziness",
            protocol: NOT_A_CASE,
            medications: "Reassurance, Anxiolytics",
            alert: "Diagnosis of exclusion",
        },
        HandbookEntry {
            name: "Stimulant Overdose",
            symptoms: "Tachycardia, Agitation, Hyperthermia",
            protocol: NOT_A_CASE,
            medications: "Benzodiazepines, Supportive care",
            alert: "Check for drug use history",
        },
        HandbookEntry {
            name: "Heat Stroke",
            symptoms: "High temp, Altered consciousness, Dry skin",
            protocol: NOT_A_CASE,
            medications: "Rapid cooling, IV Fluids",
            alert: "Environmental exposure history",
        },
        HandbookEntry {
            name: "Liver Failure",
            symptoms: "Coagulopathy, Jaundice, Encephalopathy",
            protocol: NOT_A_CASE,
            medications: "Supportive care, Transplant evaluation",
            alert: "Check liver function tests",
        },
        HandbookEntry {
            name: "Disseminated Intravascular Coagulation",
            symptoms: "Bleeding, Clotting, Low platelets",
            protocol: NOT_A_CASE,
            medications: "Treat underlying cause, Supportive",
            alert: "Complex coagulation disorder",
        },
        HandbookEntry {
            name: "Contact Dermatitis",
            symptoms: "Localized rash, Itching, Redness",
            protocol: NOT_A_CASE,
            medications: "Topical steroids, Avoidance",
            alert: "Usually localized, not systemic",
        },
        HandbookEntry {
            name: "Implant Infection",
            symptoms: "Fever, Pain at site, Swelling",
            protocol: NOT_A_CASE,
            medications: "Antibiotics, Possible removal",
            alert: "Look for signs of infection",
        },
    ]
});

/// All handbook entries, curable cases first
pub fn entries() -> &'static [HandbookEntry] {
    &HANDBOOK
}

/// Case-insensitive search over disease names and symptoms
///
/// An empty query returns every entry.
pub fn search(query: &str) -> Vec<&'static HandbookEntry> {
    let needle = query.trim().to_lowercase();
    HANDBOOK
        .iter()
        .filter(|e| {
            needle.is_empty()
                || e.name.to_lowercase().contains(&needle)
                || e.symptoms.to_lowercase().contains(&needle)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::get_default_catalog;

    #[test]
    fn test_every_database_disease_has_an_entry() {
        for case in &get_default_catalog().cases {
            for entry in &case.databases {
                let short = entry.disease.trim_start_matches("Severe ");
                assert!(
                    !search(short).is_empty(),
                    "No handbook entry for {}",
                    entry.disease
                );
            }
        }
    }

    #[test]
    fn test_search_matches_symptoms_case_insensitively() {
        let hits = search("HIVES");
        let names: Vec<_> = hits.iter().map(|e| e.name).collect();
        assert!(names.contains(&"Anaphylaxis"));
        assert!(names.contains(&"Metallergy Syndrome"));
    }

    #[test]
    fn test_empty_query_returns_everything() {
        assert_eq!(search("  ").len(), entries().len());
    }

    #[test]
    fn test_no_match() {
        assert!(search("broken leg").is_empty());
    }
}
