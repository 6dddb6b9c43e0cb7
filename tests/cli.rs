use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::tempdir;

#[test]
fn eval_prints_the_value() {
    let mut cmd = Command::cargo_bin("steplisp").expect("binary exists");
    cmd.arg("eval").arg("(+ 1 2)");
    cmd.assert().success().stdout("3\n");
}

#[test]
fn eval_reports_syntax_errors() {
    let mut cmd = Command::cargo_bin("steplisp").expect("binary exists");
    cmd.arg("eval").arg("(+ 1 2");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("syntax error: unbalanced tuple"));
}

#[test]
fn eval_with_steps_prints_the_trace() {
    let mut cmd = Command::cargo_bin("steplisp").expect("binary exists");
    cmd.arg("--steps").arg("eval").arg("(* (+ 1 1) 3)");
    cmd.assert()
        .success()
        .stdout("(* (+ 1 1) 3)\n(* 2 3)\n6\n");
}

#[test]
fn run_script_evaluates_each_line() {
    let dir = tempdir().expect("create temp dir");
    let script = dir.path().join("square.rkt");
    fs::write(
        &script,
        "; squares\n(define (square x) (* x x))\n\n(square 9)\n(exit)\n(square 2)\n",
    )
    .expect("write script");

    let mut cmd = Command::cargo_bin("steplisp").expect("binary exists");
    cmd.arg("run").arg(&script);
    cmd.assert().success().stdout("81\n");
}

#[test]
fn run_script_stops_at_the_first_error() {
    let dir = tempdir().expect("create temp dir");
    let script = dir.path().join("broken.rkt");
    fs::write(&script, "(+ 1 1)\n(1 2)\n(+ 2 2)\n").expect("write script");

    let mut cmd = Command::cargo_bin("steplisp").expect("binary exists");
    cmd.arg("run").arg(&script);
    cmd.assert()
        .failure()
        .stdout("2\n")
        .stderr(predicate::str::contains("runtime error: cannot apply `1`"));
}

#[test]
fn step_limit_flag_is_honoured() {
    let dir = tempdir().expect("create temp dir");
    let script = dir.path().join("loop.rkt");
    fs::write(&script, "(define (spin n) (spin n))\n(spin 0)\n").expect("write script");

    let mut cmd = Command::cargo_bin("steplisp").expect("binary exists");
    cmd.arg("--step-limit").arg("100").arg("run").arg(&script);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("within 100 steps"));
}

#[test]
fn repl_recovers_from_errors_and_exits_on_command() {
    let mut cmd = Command::cargo_bin("steplisp").expect("binary exists");
    cmd.arg("repl")
        .write_stdin("(+ 1 2\n(+ 20 22)\n(exit)\n(+ 500 500)\n");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("42"))
        .stdout(predicate::str::contains("1000").not())
        .stderr(predicate::str::contains("syntax error"));
}
