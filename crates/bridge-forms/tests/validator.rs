//! Validator behaviour against a realistic life insurance schema

use bridge_forms::{validate, FieldKind, FieldSpec, FormSchema, ViolationCode};
use bridge_model::{FormData, ProductCategory};
use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

fn life_schema() -> FormSchema {
    FormSchema::new(vec![
        FieldSpec::new("customer_name", "Full Name", FieldKind::Text)
            .required()
            .with_length(Some(2), Some(100)),
        FieldSpec::new("email", "Email Address", FieldKind::Email).required(),
        FieldSpec::new("phone", "Mobile Number", FieldKind::Phone).required(),
        FieldSpec::new("date_of_birth", "Date of Birth", FieldKind::Date)
            .required()
            .with_age_range(18, 65),
        FieldSpec::new("coverage_amount", "Coverage Amount", FieldKind::Number)
            .required()
            .with_range(Some(100_000.0), None),
        FieldSpec::new("pre_existing_conditions", "Conditions", FieldKind::Textarea),
    ])
    .unwrap()
}

fn category() -> ProductCategory {
    ProductCategory::new("life-insurance", "Life Insurance").unwrap()
}

fn form(v: Value) -> FormData {
    v.as_object().cloned().unwrap()
}

fn submission_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
}

fn valid_form() -> FormData {
    form(json!({
        "customer_name": "Asha Rao",
        "email": "asha@example.com",
        "phone": "9876543210",
        "date_of_birth": "1995-03-10",
        "coverage_amount": 1_000_000,
    }))
}

#[test]
fn valid_form_passes_and_reports_age() {
    let checked = validate(&category(), &valid_form(), &life_schema(), submission_date()).unwrap();
    assert_eq!(checked.category, "life-insurance");
    assert_eq!(checked.ages, vec![("date_of_birth".to_string(), 30)]);
}

#[test]
fn two_missing_required_fields_give_exactly_two_errors() {
    let mut data = valid_form();
    data.remove("email");
    data.insert("phone".into(), json!("   "));

    let err = validate(&category(), &data, &life_schema(), submission_date()).unwrap_err();
    assert_eq!(err.len(), 2);
    let fields: Vec<_> = err.violations().iter().map(|v| v.field.as_str()).collect();
    assert_eq!(fields, ["email", "phone"]);
    assert!(err
        .violations()
        .iter()
        .all(|v| v.code == ViolationCode::Required));
}

#[test]
fn seventeen_year_old_is_out_of_range() {
    let mut data = valid_form();
    // one day short of the eighteenth birthday
    data.insert("date_of_birth".into(), json!("2007-03-11"));

    let err = validate(&category(), &data, &life_schema(), submission_date()).unwrap_err();
    assert_eq!(err.len(), 1);
    let v = &err.violations()[0];
    assert_eq!(v.field, "date_of_birth");
    assert_eq!(v.code, ViolationCode::AgeOutOfRange);
    assert!(v.message.contains("got 17"), "{}", v.message);
}

#[test]
fn boundary_ages_are_inclusive() {
    for dob in ["2007-03-10", "1959-03-11"] {
        let mut data = valid_form();
        data.insert("date_of_birth".into(), json!(dob));
        assert!(
            validate(&category(), &data, &life_schema(), submission_date()).is_ok(),
            "{dob} should be accepted"
        );
    }
    let mut data = valid_form();
    data.insert("date_of_birth".into(), json!("1959-03-10"));
    assert!(validate(&category(), &data, &life_schema(), submission_date()).is_err());
}

#[test]
fn all_violations_are_reported_in_one_pass() {
    let data = form(json!({
        "customer_name": "A",
        "email": "not-an-email",
        "phone": "123",
        "date_of_birth": "10/03/1990",
        "coverage_amount": 5,
    }));
    let err = validate(&category(), &data, &life_schema(), submission_date()).unwrap_err();
    let codes: Vec<_> = err.violations().iter().map(|v| v.code).collect();
    assert_eq!(
        codes,
        [
            ViolationCode::TooShort,
            ViolationCode::InvalidEmail,
            ViolationCode::InvalidPhone,
            ViolationCode::InvalidDate,
            ViolationCode::BelowMinimum,
        ]
    );
}

#[test]
fn unknown_fields_pass_through_and_input_is_untouched() {
    let mut data = valid_form();
    data.insert("agent_remarks".into(), json!({"priority": "high"}));
    let before = data.clone();

    let checked = validate(&category(), &data, &life_schema(), submission_date()).unwrap();
    assert_eq!(data, before);
    assert_eq!(checked.form, before);
    assert_eq!(checked.into_form()["agent_remarks"]["priority"], "high");
}

#[test]
fn wrong_types_are_reported() {
    let mut data = valid_form();
    data.insert("customer_name".into(), json!(42));
    let err = validate(&category(), &data, &life_schema(), submission_date()).unwrap_err();
    assert_eq!(err.violations()[0].code, ViolationCode::InvalidType);
    assert!(err.to_string().contains("customer_name"));
}
