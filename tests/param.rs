use cellsim::engine::error::ParamError;
use cellsim::engine::param::Param;

#[test]
fn missing_fields_fall_back_to_defaults() -> Result<(), ParamError> {
    let param = Param::from_json_str(r#"{ "seed": 7, "threads": 4 }"#)?;
    assert_eq!(param.seed, 7);
    assert_eq!(param.threads, Some(4));
    assert_eq!(param.simulation_time_step, Param::default().simulation_time_step);
    assert_eq!(param.max_displacement, Param::default().max_displacement);
    Ok(())
}

#[test]
fn interaction_margin_follows_the_inter_object_coefficient() -> Result<(), ParamError> {
    let param = Param::from_json_str(r#"{ "inter_object_coefficient": 0.2 }"#)?;
    assert!((param.additional_radius() - 2.0).abs() < 1e-12);
    assert!((param.interaction_margin() - 4.0).abs() < 1e-12);
    Ok(())
}

#[test]
fn malformed_documents_are_parse_errors() {
    let err = Param::from_json_str(r#"{ "seed": "seven" }"#).expect_err("seed must be numeric");
    assert!(matches!(err, ParamError::Parse(_)));
}

#[test]
fn out_of_range_values_are_rejected() {
    let cases = [
        (r#"{ "simulation_time_step": 0.0 }"#, "simulation_time_step"),
        (r#"{ "max_displacement": -1.0 }"#, "max_displacement"),
        (r#"{ "repulsion": -2.0 }"#, "repulsion"),
        (r#"{ "min_division_volume_ratio": 1.2, "max_division_volume_ratio": 1.1 }"#, "max_division_volume_ratio"),
        (r#"{ "threads": 0 }"#, "threads"),
    ];
    for (json, field) in cases {
        match Param::from_json_str(json) {
            Err(ParamError::OutOfRange { name, .. }) => assert_eq!(name, field),
            other => panic!("expected {field} to be out of range, got {other:?}"),
        }
    }
}

#[test]
fn parameters_load_from_a_file() -> Result<(), ParamError> {
    let path = std::env::temp_dir().join(format!("cellsim-param-{}.json", std::process::id()));
    std::fs::write(&path, r#"{ "seed": 99, "max_displacement": 1.5 }"#)?;
    let loaded = Param::from_json_file(&path);
    std::fs::remove_file(&path)?;

    let param = loaded?;
    assert_eq!(param.seed, 99);
    assert_eq!(param.max_displacement, 1.5);

    let missing = Param::from_json_file(path.with_extension("missing"));
    assert!(matches!(missing, Err(ParamError::Io(_))));
    Ok(())
}

#[test]
fn serialized_parameters_load_back_unchanged() -> Result<(), ParamError> {
    let param = Param { seed: 12, threads: Some(3), repulsion: 2.5, ..Param::default() };
    let json = serde_json::to_string(&param)?;
    assert_eq!(Param::from_json_str(&json)?, param);
    Ok(())
}
