//! Property tests for the taxon forest and the vocabulary resolver

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{reference_data, verbatim};
use proptest::prelude::*;
use sos_ingest::processor::ObservationProcessor;
use sos_ingest::taxonomy::{BasicTaxon, TaxonTree, TaxonomyError};
use sos_ingest::vocabulary::{
    AreaType, FieldId, Resolution, UnmappedTally, VocabularyId, VocabularyResolver,
};

/// Parent choice per node; node `i` may only point at a lower id
fn forest() -> impl Strategy<Value = Vec<BasicTaxon>> {
    prop::collection::vec(prop::option::weighted(0.8, any::<prop::sample::Index>()), 1..80)
        .prop_map(|choices| {
            choices
                .into_iter()
                .enumerate()
                .map(|(i, choice)| {
                    let id = i as i32 + 1;
                    let parent = match choice {
                        Some(index) if i > 0 => Some(index.index(i) as i32 + 1),
                        _ => None,
                    };
                    BasicTaxon::new(id, parent, format!("taxon {}", id))
                })
                .collect()
        })
        .prop_shuffle()
}

fn expected_chain(taxa: &[BasicTaxon], id: i32) -> Vec<i32> {
    let mut chain = Vec::new();
    let mut current = taxa.iter().find(|t| t.id == id).and_then(|t| t.parent_id);
    while let Some(parent) = current {
        chain.push(parent);
        current = taxa.iter().find(|t| t.id == parent).and_then(|t| t.parent_id);
    }
    chain.reverse();
    chain
}

fn field() -> impl Strategy<Value = FieldId> {
    prop_oneof![
        prop::sample::select(VocabularyId::ALL.to_vec()).prop_map(FieldId::Vocabulary),
        prop::sample::select(vec![AreaType::County, AreaType::Municipality, AreaType::Parish])
            .prop_map(FieldId::Area),
    ]
}

proptest! {
    #[test]
    fn prop_ancestors_are_root_first_and_match_depth(taxa in forest()) {
        let tree = TaxonTree::build(taxa.clone()).unwrap();
        prop_assert_eq!(tree.len(), taxa.len());

        for taxon in &taxa {
            let ancestors: Vec<i32> = tree.ancestors(taxon.id).iter().map(|n| n.id).collect();
            let expected = expected_chain(&taxa, taxon.id);
            prop_assert_eq!(tree.depth(taxon.id), Some(expected.len()));
            prop_assert_eq!(ancestors, expected);
            if let Some(root) = tree.ancestors(taxon.id).first() {
                prop_assert!(root.is_root());
            }
        }
    }

    #[test]
    fn prop_primary_cycles_fail_construction(
        length in 1usize..12,
        extra in prop::collection::vec(any::<prop::sample::Index>(), 0..10),
    ) {
        let length = length as i32;
        // 1 -> 2 -> ... -> length -> 1
        let mut taxa: Vec<BasicTaxon> = (1..=length)
            .map(|id| BasicTaxon::new(id, Some(id % length + 1), format!("cyclic {}", id)))
            .collect();
        // Valid nodes hanging off the cycle
        for (offset, index) in extra.iter().enumerate() {
            let id = length + 1 + offset as i32;
            let parent = index.index(id as usize - 1) as i32 + 1;
            taxa.push(BasicTaxon::new(id, Some(parent), format!("hanging {}", id)));
        }

        let err = TaxonTree::build(taxa).unwrap_err();
        prop_assert!(err.is_configuration_error());
        prop_assert!(matches!(err, TaxonomyError::Cycle { .. }), "unexpected error: {}", err);
    }

    #[test]
    fn prop_unmapped_codes_pass_through_and_count_once(
        calls in prop::collection::vec((field(), "x-[a-z0-9]{1,10}"), 1..40),
    ) {
        let resolver = VocabularyResolver::with_static_vocabularies("sv-SE");
        let mut tally = UnmappedTally::default();

        for (i, (field, code)) in calls.iter().enumerate() {
            let before_total = tally.total;
            let before_field = tally.count(*field);

            let resolution = resolver.resolve(*field, code, &mut tally);

            prop_assert_eq!(resolution, Resolution::Unmapped(code.clone()));
            prop_assert_eq!(tally.total, before_total + 1);
            prop_assert_eq!(tally.count(*field), before_field + 1);
            prop_assert_eq!(tally.total, i as u64 + 1);
        }
    }

    #[test]
    fn prop_processing_is_deterministic(
        remarks in "[a-zA-Z ,.]{0,30}",
        sex in prop::sample::select(vec!["F", "male", "unknown-sex", ""]),
        count in prop::sample::select(vec!["1", "12", "many", ""]),
    ) {
        let reference = reference_data();
        let processor = ObservationProcessor::new(
            reference.taxonomy.load(),
            reference.vocabulary.snapshot(),
        );
        let mut record = verbatim(3, 17);
        record.occurrence_remarks = Some(remarks);
        record.sex = Some(sex.to_string());
        record.individual_count = Some(count.to_string());

        let first = processor.process(&record).unwrap();
        let second = processor.process(&record).unwrap();
        prop_assert_eq!(&first.observation, &second.observation);
        prop_assert_eq!(
            serde_json::to_string(&first.observation).unwrap(),
            serde_json::to_string(&second.observation).unwrap()
        );
        prop_assert_eq!(first.unmapped, second.unmapped);
    }
}

#[test]
fn test_duplicate_id_closing_a_primary_cycle_fails() {
    let taxa = vec![
        BasicTaxon::new(1, None, "Animalia"),
        BasicTaxon::new(2, Some(1), "Chordata"),
        BasicTaxon::new(3, Some(2), "Aves"),
        BasicTaxon::new(1, Some(3), "Animalia"),
    ];

    let err = TaxonTree::build(taxa).unwrap_err();
    assert!(err.is_configuration_error());
}
