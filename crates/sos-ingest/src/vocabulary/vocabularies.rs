//! Statically shipped vocabularies
//!
//! Each entry lists its canonical id, the provider codes that map to it and
//! its labels per culture. The canonical id itself is always accepted as a
//! code. Codes are matched case-insensitively after trimming.

use super::VocabularyId;

pub const CULTURE_SV: &str = "sv-SE";
pub const CULTURE_EN: &str = "en-GB";

#[derive(Debug, Clone, Copy)]
pub struct VocabularyEntry {
    pub canonical_id: &'static str,
    pub codes: &'static [&'static str],
    /// (culture, label); the first entry is the fallback
    pub labels: &'static [(&'static str, &'static str)],
}

const fn entry(
    canonical_id: &'static str,
    codes: &'static [&'static str],
    labels: &'static [(&'static str, &'static str)],
) -> VocabularyEntry {
    VocabularyEntry {
        canonical_id,
        codes,
        labels,
    }
}

const SEX: &[VocabularyEntry] = &[
    entry("1", &["male", "m", "hane"], &[(CULTURE_SV, "hane"), (CULTURE_EN, "male")]),
    entry("2", &["female", "f", "hona"], &[(CULTURE_SV, "hona"), (CULTURE_EN, "female")]),
    entry(
        "3",
        &["hermaphrodite", "hermafrodit"],
        &[(CULTURE_SV, "hermafrodit"), (CULTURE_EN, "hermaphrodite")],
    ),
    entry(
        "4",
        &["undetermined", "unknown", "okänt"],
        &[(CULTURE_SV, "okänt kön"), (CULTURE_EN, "undetermined")],
    ),
];

const LIFE_STAGE: &[VocabularyEntry] = &[
    entry("1", &["adult", "ad", "adult individ"], &[(CULTURE_SV, "adult"), (CULTURE_EN, "adult")]),
    entry("2", &["juvenile", "juv", "juvenil"], &[(CULTURE_SV, "juvenil"), (CULTURE_EN, "juvenile")]),
    entry("3", &["larva", "larv"], &[(CULTURE_SV, "larv"), (CULTURE_EN, "larva")]),
    entry("4", &["pupa", "puppa"], &[(CULTURE_SV, "puppa"), (CULTURE_EN, "pupa")]),
    entry("5", &["egg", "ägg"], &[(CULTURE_SV, "ägg"), (CULTURE_EN, "egg")]),
    entry("6", &["nymph", "nymf"], &[(CULTURE_SV, "nymf"), (CULTURE_EN, "nymph")]),
    entry(
        "7",
        &["first calendar year", "1k"],
        &[(CULTURE_SV, "1:a kalenderåret"), (CULTURE_EN, "first calendar year")],
    ),
];

const ACTIVITY: &[VocabularyEntry] = &[
    entry("1", &["flying", "flyger", "förbiflygande"], &[(CULTURE_SV, "förbiflygande"), (CULTURE_EN, "flying over")]),
    entry("2", &["foraging", "födosökande"], &[(CULTURE_SV, "födosökande"), (CULTURE_EN, "foraging")]),
    entry("3", &["singing", "sjungande"], &[(CULTURE_SV, "sjungande"), (CULTURE_EN, "singing")]),
    entry("4", &["nest building", "bobygge"], &[(CULTURE_SV, "bobygge"), (CULTURE_EN, "nest building")]),
    entry("5", &["resting", "rastande"], &[(CULTURE_SV, "rastande"), (CULTURE_EN, "resting")]),
    entry("6", &["dead", "död"], &[(CULTURE_SV, "död"), (CULTURE_EN, "dead")]),
];

const BASIS_OF_RECORD: &[VocabularyEntry] = &[
    entry(
        "0",
        &["humanobservation", "human observation"],
        &[(CULTURE_EN, "HumanObservation")],
    ),
    entry(
        "1",
        &["machineobservation", "machine observation"],
        &[(CULTURE_EN, "MachineObservation")],
    ),
    entry(
        "2",
        &["preservedspecimen", "preserved specimen"],
        &[(CULTURE_EN, "PreservedSpecimen")],
    ),
    entry("3", &["materialsample", "material sample"], &[(CULTURE_EN, "MaterialSample")]),
    entry("4", &["occurrence"], &[(CULTURE_EN, "Occurrence")]),
];

const OCCURRENCE_STATUS: &[VocabularyEntry] = &[
    entry("0", &["present", "närvarande"], &[(CULTURE_SV, "present"), (CULTURE_EN, "present")]),
    entry("1", &["absent", "frånvarande"], &[(CULTURE_SV, "absent"), (CULTURE_EN, "absent")]),
];

/// Entries of one static vocabulary
pub fn entries(id: VocabularyId) -> &'static [VocabularyEntry] {
    match id {
        VocabularyId::Sex => SEX,
        VocabularyId::LifeStage => LIFE_STAGE,
        VocabularyId::Activity => ACTIVITY,
        VocabularyId::BasisOfRecord => BASIS_OF_RECORD,
        VocabularyId::OccurrenceStatus => OCCURRENCE_STATUS,
    }
}
