use bando_core::{
    validate, validate_against_catalog, AnchorEvent, DeadlineTemplate, OffsetUnit, Reference,
    ValidatedChain, ValidationError,
};
use uuid::Uuid;

fn anchored(grant: Uuid, index: u32, event_id: &str) -> DeadlineTemplate {
    DeadlineTemplate::new(
        grant,
        index,
        format!("T{index}"),
        Reference::Anchor(event_id.into()),
        30,
        OffsetUnit::Days,
    )
}

fn after(grant: Uuid, index: u32, prior: u32) -> DeadlineTemplate {
    DeadlineTemplate::new(
        grant,
        index,
        format!("T{index}"),
        Reference::PriorDeadline(prior),
        30,
        OffsetUnit::Days,
    )
}

fn standard_catalog() -> Vec<AnchorEvent> {
    bando_core::model::anchor::STANDARD_ANCHOR_EVENTS
        .iter()
        .map(|(id, name)| AnchorEvent {
            id: (*id).to_string(),
            name: (*name).to_string(),
            description: None,
            is_standard: true,
        })
        .collect()
}

#[test]
fn accepts_well_formed_chain_in_any_input_order() {
    let grant = Uuid::new_v4();
    let chain = validate(vec![
        after(grant, 2, 0),
        anchored(grant, 0, "pubblicazione_graduatoria"),
        after(grant, 1, 0),
    ])
    .unwrap();

    let indices: Vec<u32> = chain.templates().iter().map(|t| t.sequence_index).collect();
    assert_eq!(indices, vec![0, 1, 2]);
    assert_eq!(chain.grant_id(), Some(grant));
}

#[test]
fn empty_chain_is_valid() {
    let chain = validate(Vec::new()).unwrap();
    assert!(chain.is_empty());
    assert_eq!(chain.grant_id(), None);
}

#[test]
fn self_reference_is_rejected() {
    let grant = Uuid::new_v4();
    let looping = after(grant, 1, 1);
    let looping_id = looping.id;

    let err = validate(vec![anchored(grant, 0, "avvio_progetto"), looping]).unwrap_err();
    assert_eq!(
        err,
        ValidationError::ForwardOrSelfReference {
            template_id: looping_id,
            sequence_index: 1,
            referenced_index: 1,
        }
    );
}

#[test]
fn forward_reference_is_rejected() {
    let grant = Uuid::new_v4();
    let forward = after(grant, 1, 2);
    let forward_id = forward.id;

    let err = validate(vec![
        anchored(grant, 0, "avvio_progetto"),
        forward,
        after(grant, 2, 0),
    ])
    .unwrap_err();
    assert_eq!(
        err,
        ValidationError::ForwardOrSelfReference {
            template_id: forward_id,
            sequence_index: 1,
            referenced_index: 2,
        }
    );
}

#[test]
fn gaps_and_duplicates_are_rejected() {
    let grant = Uuid::new_v4();

    let gap = validate(vec![anchored(grant, 0, "avvio_progetto"), after(grant, 2, 0)]).unwrap_err();
    assert_eq!(
        gap,
        ValidationError::NonContiguousSequence {
            expected: 1,
            found: 2
        }
    );

    let duplicate = validate(vec![
        anchored(grant, 0, "avvio_progetto"),
        after(grant, 1, 0),
        after(grant, 1, 0),
    ])
    .unwrap_err();
    assert_eq!(
        duplicate,
        ValidationError::NonContiguousSequence {
            expected: 2,
            found: 1
        }
    );

    let not_from_zero = validate(vec![anchored(grant, 1, "avvio_progetto")]).unwrap_err();
    assert_eq!(
        not_from_zero,
        ValidationError::NonContiguousSequence {
            expected: 0,
            found: 1
        }
    );
}

#[test]
fn first_template_must_be_anchored() {
    let grant = Uuid::new_v4();
    let first = after(grant, 0, 0);
    let first_id = first.id;

    let err = validate(vec![first]).unwrap_err();
    assert_eq!(
        err,
        ValidationError::InvalidFirstReference {
            template_id: first_id
        }
    );
}

#[test]
fn mixing_grants_is_rejected() {
    let grant = Uuid::new_v4();
    let other = Uuid::new_v4();
    let stray = after(other, 1, 0);
    let stray_id = stray.id;

    let err = validate(vec![anchored(grant, 0, "avvio_progetto"), stray]).unwrap_err();
    assert_eq!(
        err,
        ValidationError::ForeignTemplate {
            template_id: stray_id,
            expected_grant: grant,
            found_grant: other,
        }
    );
}

#[test]
fn later_templates_may_reference_anchors_directly() {
    let grant = Uuid::new_v4();
    let chain = validate(vec![
        anchored(grant, 0, "pubblicazione_graduatoria"),
        anchored(grant, 1, "avvio_progetto"),
        after(grant, 2, 1),
    ])
    .unwrap();

    let anchors: Vec<&str> = chain.anchor_event_ids().into_iter().collect();
    assert_eq!(anchors, vec!["avvio_progetto", "pubblicazione_graduatoria"]);
    validate_against_catalog(&chain, &standard_catalog()).unwrap();
}

#[test]
fn unknown_anchor_is_rejected_against_catalog() {
    let grant = Uuid::new_v4();
    let unknown = anchored(grant, 0, "firma_convenzione");
    let unknown_id = unknown.id;
    let chain = validate(vec![unknown]).unwrap();

    let err = validate_against_catalog(&chain, &standard_catalog()).unwrap_err();
    assert_eq!(
        err,
        ValidationError::UnknownAnchorEvent {
            template_id: unknown_id,
            event_id: "firma_convenzione".to_string(),
        }
    );

    let mut catalog = standard_catalog();
    catalog.push(AnchorEvent::custom("firma_convenzione", "Firma Convenzione", None).unwrap());
    validate_against_catalog(&chain, &catalog).unwrap();
}

#[test]
fn deserializing_a_chain_revalidates_it() {
    let grant = Uuid::new_v4();
    let chain = validate(vec![
        anchored(grant, 0, "avvio_progetto"),
        after(grant, 1, 0),
    ])
    .unwrap();

    let json = serde_json::to_string(&chain).unwrap();
    let restored: ValidatedChain = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, chain);

    let broken = serde_json::to_string(&vec![after(grant, 0, 0)]).unwrap();
    assert!(serde_json::from_str::<ValidatedChain>(&broken).is_err());
}
