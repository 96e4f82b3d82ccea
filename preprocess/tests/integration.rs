//
// Copyright (c) 2024 Hemi Labs, Inc.
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

use similar_asserts::assert_eq;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

struct TestPlan {
    args: Vec<String>,
    stdin_data: String,
    expected_out: String,
    expected_err: String,
    expected_exit_code: i32,
}

/// Unescape newlines and carriage returns from .out file format
fn unescape(input: &str) -> String {
    input.replace("\\r", "\r").replace("\\n", "\n")
}

/// Parse the .out file format (key=value lines)
fn parse_out_file(content: &str) -> (String, String, i32) {
    let mut stdout = String::new();
    let mut stderr = String::new();
    let mut status = 0i32;

    for line in content.lines() {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            match key {
                "stdout" => stdout = unescape(value),
                "stderr" => stderr = unescape(value),
                "status" => status = value.parse().unwrap_or(0),
                _ => {}
            }
        }
    }

    (stdout, stderr, status)
}

/// The input is fed through stdin, extra command line arguments come from an optional .args
/// file with one argument per line.
fn load_fixture(name: &str) -> TestPlan {
    let base = Path::new("fixtures/integration_tests");

    let args_path = base.join(format!("{name}.args"));
    let in_path = base.join(format!("{name}.in"));
    let out_path = base.join(format!("{name}.out"));

    let out_content = fs::read_to_string(&out_path)
        .unwrap_or_else(|_| panic!("Failed to read {}", out_path.display()));
    let (expected_out, expected_err, expected_exit_code) = parse_out_file(&out_content);

    let args = if args_path.exists() {
        fs::read_to_string(&args_path)
            .unwrap_or_else(|_| panic!("Failed to read {}", args_path.display()))
            .lines()
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect()
    } else {
        Vec::new()
    };

    let stdin_data = fs::read_to_string(&in_path)
        .unwrap_or_else(|_| panic!("Failed to read {}", in_path.display()));

    TestPlan {
        args,
        stdin_data,
        expected_out,
        expected_err,
        expected_exit_code,
    }
}

fn run_plan(plan: &TestPlan, env_vars: &[(&str, &str)]) -> Output {
    let mut command = Command::new(env!("CARGO_BIN_EXE_preprocess"));
    command
        .args(&plan.args)
        .envs(env_vars.iter().copied())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let mut child = command.spawn().expect("failed to spawn preprocess");
    child
        .stdin
        .take()
        .unwrap()
        .write_all(plan.stdin_data.as_bytes())
        .unwrap();
    child.wait_with_output().unwrap()
}

fn run_test(plan: TestPlan) {
    run_test_with_env(plan, &[]);
}

fn run_test_with_env(plan: TestPlan, env_vars: &[(&str, &str)]) {
    let output = run_plan(&plan, env_vars);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout, plan.expected_out);

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(stderr, plan.expected_err);

    assert_eq!(output.status.code(), Some(plan.expected_exit_code));
}

macro_rules! pp_test {
    ($name:ident) => {
        #[test]
        fn $name() {
            run_test(load_fixture(stringify!($name)));
        }
    };
}

pp_test!(passthrough);
pp_test!(define);
pp_test!(define_from_args);
pp_test!(define_in_inactive_branch);
pp_test!(if_nested);
pp_test!(if_defined);
pp_test!(if_unterminated);
pp_test!(else_without_if);
pp_test!(switch_first_match);
pp_test!(switch_default);
pp_test!(cyclic_reference);
pp_test!(undefined_variable);
pp_test!(undefined_variable_default);
pp_test!(comments_strip);
pp_test!(comments_remove);
pp_test!(comments_keep);
pp_test!(comment_markers);
pp_test!(tab_stop);
pp_test!(indent_remove_blank);
pp_test!(line_ending_crlf);
pp_test!(style_curly);
pp_test!(style_paren);
pp_test!(statement_marker);
pp_test!(no_statements);
pp_test!(no_expand);

#[test]
fn environment_variable() {
    run_test_with_env(
        load_fixture("environment_variable"),
        &[("PREPROCESS_TEST_HOST", "db.example.com")],
    );
}

#[test]
fn two_files() {
    run_test(TestPlan {
        args: vec![
            String::from("-D"),
            String::from("who=files"),
            String::from("fixtures/integration_tests/two_files_1.in"),
            String::from("fixtures/integration_tests/two_files_2.in"),
        ],
        stdin_data: String::new(),
        expected_out: String::from("first files\nsecond files\n"),
        expected_err: String::new(),
        expected_exit_code: 0,
    });
}

#[test]
fn missing_file() {
    let plan = TestPlan {
        args: vec![String::from("fixtures/integration_tests/does_not_exist.in")],
        stdin_data: String::new(),
        expected_out: String::new(),
        expected_err: String::new(),
        expected_exit_code: 1,
    };
    let output = run_plan(&plan, &[]);
    assert_eq!(output.status.code(), Some(plan.expected_exit_code));
    assert!(String::from_utf8_lossy(&output.stderr)
        .starts_with("preprocess: fixtures/integration_tests/does_not_exist.in: "));
}
