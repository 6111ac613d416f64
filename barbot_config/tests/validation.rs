use barbot_config::{IngredientKind, load_toml};
use rstest::rstest;

const BASE: &str = r#"
[connection]
address = "/dev/rfcomm0"
read_timeout_ms = 500

[machine]
ice_crusher_connected = true
ice_amount = 80

[[ingredients]]
id = "rum"
name = "Rum"
kind = "spirit"

[[ingredients]]
id = "grenadine"
name = "Grenadine"
kind = "sirup"
density = 1.3

[[ports]]
port = 0
ingredient = "rum"

[[ports]]
port = 7
ingredient = "grenadine"
"#;

#[test]
fn accepts_full_document() {
    let cfg = load_toml(BASE).expect("parse TOML");
    cfg.validate().expect("valid config should pass");
    assert_eq!(cfg.connection.address.as_deref(), Some("/dev/rfcomm0"));
    assert_eq!(cfg.connection.read_timeout_ms, 500);
    // untouched fields keep defaults
    assert_eq!(cfg.connection.reconnect_delay_ms, 1000);
    assert!(cfg.machine.ice_crusher_connected);
    assert_eq!(cfg.machine.sugar_per_unit, 4);
    let g = cfg.ingredient("grenadine").unwrap();
    assert_eq!(g.kind, IngredientKind::Sirup);
    assert!((g.density - 1.3).abs() < f32::EPSILON);
    assert!((cfg.ingredient("rum").unwrap().density - 1.0).abs() < f32::EPSILON);
}

#[rstest]
#[case("[connection]\nbaud_rate = 0", "connection.baud_rate must be > 0")]
#[case("[connection]\naddress = \"\"", "connection.address")]
#[case("[connection]\nmax_idle_timeouts = 0", "connection.max_idle_timeouts")]
#[case("[machine]\nmax_speed = 0", "machine.max_speed must be > 0")]
#[case("[machine]\nbalance_calibration = 0.0", "machine.balance_calibration")]
#[case("[machine]\nsugar_per_unit = 0", "machine.sugar_per_unit")]
#[case("[machine]\nstirring_time_ms = 500", "machine.stirring_time_ms")]
#[case("[timing]\npoll_interval_ms = 0", "timing.poll_interval_ms")]
#[case("[logging]\nrotation = \"weekly\"", "logging.rotation")]
#[case(
    "[[ingredients]]\nid = \"a\"\nname = \"A\"\nkind = \"juice\"\ndensity = 0.0",
    "ingredients[0].density"
)]
#[case(
    "[[ingredients]]\nid = \"a\"\nname = \"A\"\nkind = \"juice\"\n[[ingredients]]\nid = \"a\"\nname = \"B\"\nkind = \"juice\"",
    "defined twice"
)]
#[case("[[ports]]\nport = 3\ningredient = \"ghost\"", "not listed")]
#[case(
    "[[ingredients]]\nid = \"a\"\nname = \"A\"\nkind = \"other\"\n[[ports]]\nport = 12\ningredient = \"a\"",
    "ports[0].port must be < 12"
)]
#[case(
    "[[ingredients]]\nid = \"a\"\nname = \"A\"\nkind = \"other\"\n[[ports]]\nport = 1\ningredient = \"a\"\n[[ports]]\nport = 1\ningredient = \"a\"",
    "assigned twice"
)]
fn rejects_invalid_values(#[case] toml: &str, #[case] needle: &str) {
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should be rejected");
    assert!(
        format!("{err}").contains(needle),
        "error '{err}' should mention '{needle}'"
    );
}

#[test]
fn unknown_ingredient_kind_is_a_parse_error() {
    let toml = "[[ingredients]]\nid = \"x\"\nname = \"X\"\nkind = \"gas\"";
    assert!(load_toml(toml).is_err());
}

#[test]
fn pump_power_out_of_range_is_a_parse_error() {
    assert!(load_toml("[machine]\npump_power = 300").is_err());
}

#[test]
fn loads_sample_config_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("barbot.toml");
    std::fs::write(&path, BASE).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    load_toml(&text).unwrap().validate().unwrap();
}

#[test]
fn shipped_sample_is_valid() {
    let text = include_str!("../../etc/barbot.toml");
    let cfg = load_toml(text).expect("sample parses");
    cfg.validate().expect("sample validates");
    assert_eq!(cfg.ports.len(), 4);
    assert_eq!(cfg.ingredient("stir").map(|i| i.kind), Some(IngredientKind::Stirr));
}
