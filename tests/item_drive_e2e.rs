//! End-to-end item drive flows over the in-memory backend.

use std::sync::Arc;

use itemdrive::{
    AttributeQuery, DataSource, FactQuery, InMemoryDataSource, ItemDrive, ItemId, PartialFact, PartialItem,
    QueryMode, ValueType,
};

fn drive() -> ItemDrive {
    ItemDrive::new(Arc::new(InMemoryDataSource::new()))
}

#[test]
fn test_person_round_trip() {
    let drive = drive();
    let item = drive
        .insert_item(
            PartialItem::new()
                .item_type("person")
                .attribute(PartialFact::new().attribute("name").value(["Ethan"])),
        )
        .unwrap();

    let fetched = drive.fetch_item(&item.item_id).unwrap();
    assert_eq!(fetched.attributes.len(), 1);
    assert_eq!(fetched.attributes[0].attribute, "name");
    assert_eq!(fetched.attributes[0].value(), vec!["Ethan"]);
    assert_eq!(fetched.item_type, "person");
}

#[test]
fn test_n_facts_under_one_item() {
    let drive = drive();
    let item_id = ItemId::from("bag");
    let partials = (0..25)
        .map(|i| PartialFact::new().item_id(item_id.clone()).attribute(format!("slot-{i}")).value(["x"]))
        .collect();
    drive.insert_facts(partials).unwrap();
    drive
        .insert_fact(PartialFact::new().item_id("elsewhere").attribute("slot").value(["y"]))
        .unwrap();

    let facts = drive.fetch_facts(&FactQuery::for_item(item_id.clone())).unwrap();
    assert_eq!(facts.len(), 25);
    assert!(facts.iter().all(|f| f.item_id == item_id));
}

#[test]
fn test_updates_by_reusing_fact_ids_and_discarding() {
    let drive = drive();
    let item = drive
        .insert_item(
            PartialItem::new()
                .item_type("todo")
                .attribute(PartialFact::new().attribute("title").value(["Buy milk"]))
                .attribute(
                    PartialFact::new()
                        .attribute("done")
                        .value_type(ValueType::Boolean)
                        .value(["false"]),
                ),
        )
        .unwrap();

    // Overwrite "done" in place.
    let done = item.attribute("done").unwrap();
    drive
        .insert_fact(done.to_partial().value(["true"]).timestamp(done.timestamp + chrono::TimeDelta::seconds(1)))
        .unwrap();
    // Retire the title.
    let title = item.attribute("title").unwrap();
    drive.insert_fact(title.to_partial().discarded(true)).unwrap();

    let fetched = drive.fetch_item(&item.item_id).unwrap();
    assert_eq!(fetched.attributes.len(), 2);
    assert_eq!(fetched.attribute("done").unwrap().numerical_value(), Some(vec![1.0]));
    assert!(fetched.attribute("title").is_none());

    let active = drive
        .fetch_items(&FactQuery::new().item_id(item.item_id.clone()).include_discarded(false))
        .unwrap();
    assert_eq!(active.len(), 1);
}

#[test]
fn test_cross_item_link() {
    let drive = drive();
    let pet = drive
        .insert_item(
            PartialItem::new()
                .item_type("pet")
                .attribute(PartialFact::new().attribute("name").value(["Rex"])),
        )
        .unwrap();
    let owner = drive
        .insert_item(
            PartialItem::new()
                .item_type("person")
                .attribute(PartialFact::new().attribute("name").value(["Ethan"]))
                .attribute(
                    PartialFact::new()
                        .item_id(pet.item_id.clone())
                        .item_type("pet")
                        .attribute("owner")
                        .value_type(ValueType::ItemId)
                        .value(["ethan"]),
                ),
        )
        .unwrap();

    assert_eq!(owner.attributes.len(), 1);
    assert_eq!(drive.fetch_item(&owner.item_id).unwrap(), owner);
    let pet = drive.fetch_item(&pet.item_id).unwrap();
    assert_eq!(pet.attributes.len(), 2);
    assert_eq!(pet.attribute("owner").unwrap().value(), vec!["ethan"]);
}

#[test]
fn test_batch_failure_keeps_earlier_items() {
    let drive = drive();
    let err = drive
        .insert_items(vec![
            PartialItem::new()
                .item_id("first")
                .attribute(PartialFact::new().attribute("name").value(["ok"])),
            PartialItem::new()
                .item_id("second")
                .attribute(PartialFact::new().attribute("age").value_type(ValueType::Number).value(["abc"])),
            PartialItem::new()
                .item_id("third")
                .attribute(PartialFact::new().attribute("name").value(["never"])),
        ])
        .unwrap_err();

    assert!(err.is_validation());
    assert!(drive.fetch_item(&ItemId::from("first")).is_ok());
    assert!(drive.fetch_item(&ItemId::from("second")).unwrap_err().is_not_found());
    assert!(drive.fetch_item(&ItemId::from("third")).unwrap_err().is_not_found());
}

#[test]
fn test_query_modes_over_items() {
    let drive = drive();
    for (name, born) in [("Ethan", "1990-05-01"), ("Ash", "2015-01-01"), ("Ethan", "2018-07-04")] {
        drive
            .insert_item(
                PartialItem::new()
                    .item_type("person")
                    .attribute(PartialFact::new().attribute("name").value([name]))
                    .attribute(
                        PartialFact::new()
                            .attribute("born")
                            .value_type(ValueType::DateTime)
                            .value([born]),
                    ),
            )
            .unwrap();
    }

    let cutoff = chrono::DateTime::parse_from_rfc3339("2000-01-01T00:00:00Z")
        .unwrap()
        .timestamp_millis() as f64;
    let query = FactQuery::new()
        .attribute(AttributeQuery::new("name").value_includes(["Ethan"]))
        .attribute(AttributeQuery::new("born").at_or_below(cutoff));

    assert!(drive.fetch_items(&query).unwrap().is_empty());

    let items = drive.fetch_items(&query.mode(QueryMode::ItemConjunction)).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(
        items[0].attribute("born").unwrap().value(),
        vec!["1990-05-01T00:00:00.000Z"]
    );
}
