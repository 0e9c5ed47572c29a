use calmform::form::{FormController, FormModel, SubmitOutcome};
use calmform::path::Path;

#[derive(serde::Serialize, serde::Deserialize, calmform::form::FormModel)]
struct DemoForm {
    email: String,
    #[serde(rename = "displayName")]
    display_name: String,
}

fn main() {
    let fields = DemoForm::fields();
    assert_eq!(fields.email().as_str(), "email");
    assert_eq!(Path::from(fields.display_name()), Path::parse("displayName"));

    let model = DemoForm {
        email: "a@calm.form".to_string(),
        display_name: "Ada".to_string(),
    };
    let form = FormController::builder(model.to_values().expect("model values"))
        .build(|_values, _form| Ok(SubmitOutcome::Settled));
    drop(form.set_field_value(fields.email(), "b@calm.form", Some(false)));

    let saved = DemoForm::from_values(&form.state().expect("state").values).expect("model");
    assert_eq!(saved.email, "b@calm.form");
    assert_eq!(saved.display_name, "Ada");
}
