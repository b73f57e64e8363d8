use clap::Parser;
use expect_test::{expect, Expect};

use super::*;

fn args(argv: &[&str]) -> Args {
    Args::try_parse_from(Some("veribc").into_iter().chain(argv.iter().copied()))
        .expect("could not parse arguments")
}

fn config(argv: &[&str]) -> Config {
    Config::resolve(&args(argv), None)
}

fn run(config: Config, source: &str) -> (Result<Outcome, error::CliError>, String) {
    yansi::Paint::disable();
    concolor::set(concolor::ColorChoice::Never);
    let mut driver = Driver::new(config);
    let mut out = Vec::new();
    let outcome = driver.check_source("m.bcasm", source.to_string(), &mut out);
    (outcome, String::from_utf8_lossy(&out).into_owned())
}

#[track_caller]
fn check_output(config: Config, source: &str, expect: Expect) {
    let (outcome, out) = run(config, source);
    assert!(outcome.is_ok(), "unexpected error: {outcome:?}");
    expect.assert_eq(&out);
}

const BRANCHY: &str = r#"
code "m" stacksize 1 {
    consts { none }
    LOAD_CONST 0
    POP_JUMP_IF_FALSE @end
    LOAD_CONST 0
    RETURN_VALUE
end:
    LOAD_CONST 0
    RETURN_VALUE
}"#;

#[test]
fn defaults() {
    let config = config(&["a.bcasm", "b.bcasm"]);
    assert_eq!(
        config,
        Config {
            inputs: vec!["a.bcasm".into(), "b.bcasm".into()],
            dump_blocks: false,
            check_header: true,
            log_filter: "warn".to_string(),
        }
    );
    assert_eq!(config.verifier(), veribc::VerifierConfig::default());
}

#[test]
fn inputs_are_required() {
    assert!(Args::try_parse_from(["veribc"]).is_err());
}

#[test]
fn flags() {
    let config = config(&["--dump-blocks", "--no-header-check", "a.bcasm"]);
    assert!(config.dump_blocks);
    assert!(!config.check_header);
    assert!(!config.verifier().check_header);
}

#[test]
fn verbosity_overrides_environment() {
    let args_v = args(&["-vv", "a.bcasm"]);
    assert_eq!(
        Config::resolve(&args_v, Some("veribc=trace".into())).log_filter,
        "debug"
    );
    let args_vvv = args(&["-vvv", "a.bcasm"]);
    assert_eq!(Config::resolve(&args_vvv, None).log_filter, "trace");

    let quiet = args(&["a.bcasm"]);
    assert_eq!(
        Config::resolve(&quiet, Some("veribc=trace".into())).log_filter,
        "veribc=trace"
    );
    assert_eq!(
        Config::resolve(&quiet, Some(String::new())).log_filter,
        "warn"
    );
}

#[test]
fn passing_file() {
    check_output(
        config(&["m.bcasm"]),
        BRANCHY,
        expect![[r#"
            m.bcasm: ok
        "#]],
    );
}

#[test]
fn dump_blocks() {
    check_output(
        config(&["--dump-blocks", "m.bcasm"]),
        BRANCHY,
        expect![[r#"
            code object `m`:
            bb0 (depth 0):
                 0 LOAD_CONST             0
                 2 POP_JUMP_IF_FALSE      4 -> bb2
            bb1 (depth 0):
                 4 LOAD_CONST             0
                 6 RETURN_VALUE           0
            bb2 (depth 0):
                 8 LOAD_CONST             0
                10 RETURN_VALUE           0
            m.bcasm: ok
        "#]],
    );
}

#[test]
fn failing_file_reports_location() {
    let source = r#"code "m" stacksize 1 { LOAD_CONST 0 POP_TOP POP_TOP }"#;
    let (outcome, out) = run(config(&["m.bcasm"]), source);
    assert_eq!(outcome.unwrap(), Outcome::Fail);
    assert!(out.starts_with("m.bcasm: FAIL\n"), "{out}");
    assert!(out.contains(
        "Stack depth -1 dips below minimum of 0 for operation POP_TOP @ offset 4 \
         (after fall-through)."
    ));
    assert!(out.contains("in code object `m`"));
}

#[test]
fn header_check_can_be_disabled() {
    let source = r#"code "m" stacksize 1 { consts { none } LOAD_CONST 1 RETURN_VALUE }"#;
    let (outcome, out) = run(config(&["m.bcasm"]), source);
    assert_eq!(outcome.unwrap(), Outcome::Fail);
    assert!(out.contains("First instruction has operand 1, expected 0."));

    let (outcome, _) = run(config(&["--no-header-check", "m.bcasm"]), source);
    assert_eq!(outcome.unwrap(), Outcome::Pass);
}

#[test]
fn assembly_error() {
    let (outcome, out) = run(config(&["m.bcasm"]), r#"code "m" stacksize 0 { NOPE }"#);
    let err = outcome.unwrap_err();
    expect![["could not assemble `m.bcasm`: unknown instruction `NOPE`."]]
        .assert_eq(&err.to_string());
    assert!(out.contains("not in instruction set `cpython-3.10`"));
}

#[test]
fn missing_file() {
    let mut driver = Driver::new(config(&["missing.bcasm"]));
    let err = driver
        .check_file(std::path::Path::new("does/not/exist.bcasm"), &mut Vec::new())
        .unwrap_err();
    assert!(matches!(err, error::CliError::Read { .. }));
}
