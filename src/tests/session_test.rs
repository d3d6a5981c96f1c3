use indoc::indoc;

use crate::session::{Error, Outcome, Session, SessionConfig};
use crate::tests::common::run_script;

#[test]
fn test_family_script() {
    let output = run_script(indoc! {"
        !parent tom bob
        !parent tom liz
        !parent bob ann
        [parent tom $c] $c
        #grandchild <g> [parent g $c] [parent $c $k] $k
        grandchild tom
    "});
    assert_eq!(
        output,
        vec![
            "asserted 1 fact",
            "asserted 1 fact",
            "asserted 1 fact",
            "bob",
            "liz",
            "defined grandchild with 1 alternative",
            "ann",
        ]
    );
}

#[test]
fn test_hypothetical_facts_stay_hypothetical() {
    let output = run_script(indoc! {"
        !parent bob ann
        {parent ann joe} [parent ann $c] $c
        [parent ann $c] $c
        :facts
    "});
    assert_eq!(output[1], "joe");
    assert!(output[2].starts_with("evaluation failed: no fact in the world matches"));
    assert_eq!(output[3], "parent bob ann");
    assert_eq!(output.len(), 4);
}

#[test]
fn test_declaring_a_disjunction() {
    let output = run_script(indoc! {"
        !color red
        !color blue
        #c [color $x] $x
        !likes c
        [likes $what] $what
    "});
    assert_eq!(output[2], "defined c with 2 alternatives");
    assert_eq!(output[3], "asserted 2 facts");
    assert_eq!(&output[4..], &["blue", "red"]);
}

#[test]
fn test_definitions_are_closures() {
    let output = run_script(indoc! {"
        #konst <x> <y> x
        #always-a konst a
        always-a b
        always-a c
        :env
    "});
    assert_eq!(output[2], "a");
    assert_eq!(output[3], "a");
    assert_eq!(output[4], "always-a = <y> a");
    assert!(output[5].starts_with("konst = <x> <y> $x"));
}

#[test]
fn test_fresh_values_in_facts() {
    let output = run_script(indoc! {"
        !owns ? car
        !owns ? car
        [owns $who car] $who
    "});
    assert_eq!(output.len(), 4);
    assert!(output[2].starts_with('?'));
    assert!(output[3].starts_with('?'));
    assert_ne!(output[2], output[3]);
}

#[test]
fn test_pattern_definitions() {
    let output = run_script(indoc! {"
        #unwrap <o : some $v> v
        unwrap (some gift)
        unwrap none
    "});
    assert_eq!(output[1], "gift");
    assert!(output[2].contains("doesn't match"));
}

#[test]
fn test_errors_do_not_stop_the_script() {
    let output = run_script(indoc! {"
        (unbalanced
        :what
        hello
        :q
        never reached
    "});
    assert_eq!(output.len(), 3);
    assert!(output[0].starts_with("syntax error"));
    assert_eq!(output[1], "unknown command ':what'");
    assert_eq!(output[2], "hello");
}

#[test]
fn test_limit_applies_to_every_evaluation() {
    let mut session = Session::new(SessionConfig {
        max_results: 3,
        ..SessionConfig::default()
    });
    for n in ["a", "b", "c", "d", "e"] {
        session.run_line(&format!("!item {}", n)).unwrap();
    }
    let outcome = session.run_line("#some-items [item $i] $i").unwrap();
    assert_eq!(
        outcome,
        Outcome::Lines(vec!["defined some-items with 3 alternatives".to_string()])
    );
    let outcome = session.run_line("!chosen some-items").unwrap();
    assert_eq!(outcome, Outcome::Lines(vec!["asserted 3 facts".to_string()]));
    assert_eq!(session.world().len(), 8);
}

#[test]
fn test_config_from_file() {
    use tempfile::TempDir;

    let temp_dir = TempDir::new().unwrap();
    let good = temp_dir.path().join("good.json");
    std::fs::write(&good, r#"{"max_results": 4, "prompt": "?- "}"#).unwrap();
    let config = SessionConfig::load(&good).unwrap();
    assert_eq!(config.max_results, 4);
    assert_eq!(config.prompt, "?- ");

    let partial = temp_dir.path().join("partial.json");
    std::fs::write(&partial, r#"{"prompt": "| "}"#).unwrap();
    let config = SessionConfig::load(&partial).unwrap();
    assert_eq!(config.max_results, SessionConfig::default().max_results);

    let bad = temp_dir.path().join("bad.json");
    std::fs::write(&bad, r#"{"max_results": "lots"}"#).unwrap();
    match SessionConfig::load(&bad) {
        Err(e @ Error::Config(_)) => {
            let message = e.to_string();
            assert!(message.starts_with("invalid config: "));
            assert!(message.contains("bad.json"));
        }
        other => panic!("expected a config error, got {:?}", other),
    }

    let missing = temp_dir.path().join("missing.json");
    assert!(matches!(SessionConfig::load(&missing), Err(Error::Io(_))));
}

#[test]
fn test_script_from_file() {
    use tempfile::TempDir;

    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("family.wl");
    std::fs::write(
        &path,
        indoc! {"
            !parent tom bob
            [parent tom $c] $c
            :q
            !parent tom liz
        "},
    )
    .unwrap();
    let script = std::fs::read_to_string(&path).unwrap();
    let mut session = Session::new(SessionConfig::default());
    assert_eq!(session.run_script(&script), vec!["asserted 1 fact", "bob"]);
    assert_eq!(session.world().len(), 1);
}
