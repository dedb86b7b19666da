use super::*;

fn product(name: &str, category: &str, quantity: &str) -> ProductInput {
    ProductInput {
        name: name.to_string(),
        category: category.to_string(),
        quantity: quantity.to_string(),
    }
}

#[test]
fn valid_product_is_trimmed_and_typed() {
    let parsed = product("  Widget ", "Tools", " 5 ").validate().expect("valid");
    assert_eq!(
        parsed,
        NewProduct {
            name: "Widget".to_string(),
            category: "Tools".to_string(),
            quantity: 5,
        }
    );
}

#[test]
fn missing_fields_are_reported_per_field() {
    let errors = product("", "  ", "").validate().expect_err("invalid");
    assert_eq!(errors.get("name"), ["This field is required."]);
    assert_eq!(errors.get("category"), ["This field is required."]);
    assert_eq!(errors.get("quantity"), ["This field is required."]);
}

#[test]
fn negative_or_fractional_quantity_is_rejected() {
    let negative = product("Widget", "Tools", "-1").validate().expect_err("negative");
    assert_eq!(
        negative.get("quantity"),
        ["Ensure this value is greater than or equal to 0."]
    );

    let fractional = product("Widget", "Tools", "2.5").validate().expect_err("fraction");
    assert_eq!(fractional.get("quantity"), ["Enter a whole number."]);
    assert!(fractional.get("name").is_empty());
}

#[test]
fn overlong_name_is_rejected() {
    let long = "x".repeat(NAME_MAX_CHARS + 1);
    let errors = product(&long, "Tools", "1").validate().expect_err("too long");
    assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["name"]);
}

#[test]
fn order_requires_existing_shape() {
    let order = OrderInput {
        product: "3".to_string(),
        order_quantity: "2".to_string(),
    }
    .validate()
    .expect("valid");
    assert_eq!(order.product_id, ProductId(3));
    assert_eq!(order.order_quantity, 2);

    let errors = OrderInput {
        product: "abc".to_string(),
        order_quantity: "0".to_string(),
    }
    .validate()
    .expect_err("invalid");
    assert_eq!(errors.get("product"), ["Select a valid choice."]);
    assert_eq!(
        errors.get("order_quantity"),
        ["Ensure this value is greater than or equal to 1."]
    );
}

#[test]
fn summary_joins_field_messages() {
    let mut errors = FieldErrors::default();
    errors.add("quantity", "This field is required.");
    errors.add(NON_FIELD, "bad row");
    assert_eq!(
        errors.summary(),
        "__all__: bad row; quantity: This field is required."
    );
}

#[test]
fn edit_form_prefills_from_stored_product() {
    let stored = Product {
        id: ProductId(3),
        name: "Widget".into(),
        category: "Tools".into(),
        quantity: 5,
    };
    let input = ProductInput::from(&stored);
    assert_eq!(input.quantity, "5");
    assert_eq!(input.validate().expect("valid").with_id(stored.id), stored);
}
