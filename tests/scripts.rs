//! End-to-end runs of whole scripts against the echo connection.

use indoc::indoc;

use exscript::{
    parse, Compiler, Connection, ConnectionError, EchoConnection, RuntimeError, Scalar, Value,
};

fn run(source: &str, conn: &mut EchoConnection) -> exscript::Execution {
    parse(source).expect("compile failed").execute(conn).expect("run failed")
}

#[test]
fn template_lines_are_sent_with_substitution() {
    let source = indoc! {r#"
        {host = "r1"}
        ping $host
        show version
    "#};
    let mut conn = EchoConnection::new();
    let execution = run(source, &mut conn);
    assert_eq!(conn.sent(), ["ping r1", "show version"]);
    assert_eq!(execution.output, ["ping r1", "show version"]);
}

#[test]
fn comment_lines_never_reach_the_device() {
    let source = indoc! {"
        # reload procedure, keep in sync with the runbook
        show version
        # trailing note
    "};
    let mut conn = EchoConnection::new();
    run(source, &mut conn);
    assert_eq!(conn.sent(), ["show version"]);
}

#[test]
fn backslash_n_sends_an_embedded_newline() {
    let mut conn = EchoConnection::new();
    run("echo a\\nb\n", &mut conn);
    assert_eq!(conn.sent(), ["echo a\nb"]);
}

#[test]
fn from_to_without_as_counts_through_counter() {
    let source = indoc! {"
        {
            total = 0
            loop from 1 to 3
                total = total + counter
            end
        }
    "};
    let execution = run(source, &mut EchoConnection::new());
    assert_eq!(execution.variables["total"], Value::int(6));
}

#[test]
fn escaped_dollar_stays_literal_all_the_way_to_the_device() {
    let mut conn = EchoConnection::new();
    run("echo \\$foo\n", &mut conn);
    assert_eq!(conn.sent(), ["echo $foo"]);
}

#[test]
fn extract_reads_the_response_of_the_previous_command() {
    let source = indoc! {r"
        show ip int brief
        {extract /^(\S+)\s+(up|down)$/ as iface, state}
    "};
    let mut conn = EchoConnection::new();
    conn.push_response("Fa0/1 up\nFa0/2 down\nbanner text");
    let execution = run(source, &mut conn);
    assert_eq!(
        execution.variables["iface"],
        Value::List(vec![
            Scalar::Text("Fa0/1".to_string()),
            Scalar::Text("Fa0/2".to_string()),
        ])
    );
    assert_eq!(
        execution.variables["state"],
        Value::List(vec![
            Scalar::Text("up".to_string()),
            Scalar::Text("down".to_string()),
        ])
    );
}

#[test]
fn extract_as_replaces_while_into_appends() {
    let source = indoc! {r#"
        {
            line = "foo-bar"
            extract /(\w+)-(\w+)/ as head, tail from line
            extract /(\w+)-(\w+)/ into head, tail from line
        }
    "#};
    let mut conn = EchoConnection::new();
    let execution = run(source, &mut conn);
    assert_eq!(
        execution.variables["head"],
        Value::List(vec![
            Scalar::Text("foo".to_string()),
            Scalar::Text("foo".to_string()),
        ])
    );
}

#[test]
fn append_builds_lists_one_element_at_a_time() {
    let source = indoc! {r#"
        {
            append "a" to letters
            append "b" to letters
        }
    "#};
    let execution = run(source, &mut EchoConnection::new());
    assert_eq!(
        execution.variables["letters"],
        Value::List(vec![
            Scalar::Text("a".to_string()),
            Scalar::Text("b".to_string()),
        ])
    );
}

#[test]
fn arithmetic_follows_operator_priorities() {
    let source = indoc! {"
        {
            sum = 1 + 2 * 3
            grouped = (1 + 2) * 3
            logic = false or true and false
        }
    "};
    let execution = run(source, &mut EchoConnection::new());
    assert_eq!(execution.variables["sum"], Value::int(7));
    assert_eq!(execution.variables["grouped"], Value::int(9));
    assert_eq!(execution.variables["logic"], Value::bool(false));
}

#[test]
fn from_to_loops_are_inclusive() {
    let source = indoc! {"
        {
            total = 0
            loop from 1 to 4 as i
                total = total + i
            end
        }
    "};
    let execution = run(source, &mut EchoConnection::new());
    assert_eq!(execution.variables["total"], Value::int(10));
    assert!(!execution.variables.contains_key("i"));
}

#[test]
fn until_stops_before_the_body_runs() {
    let source = indoc! {"
        {
            total = 0
            loop from 1 to 10 as i until i gt 3
                total = total + i
            end
        }
    "};
    let execution = run(source, &mut EchoConnection::new());
    assert_eq!(execution.variables["total"], Value::int(6));
}

#[test]
fn parallel_lists_iterate_together() {
    let source = indoc! {r#"
        {
            extract /(\w+)=(\w+)/ as names, values from "a=1"
            extract /(\w+)=(\w+)/ into names, values from "b=2"
            pairs = ""
            loop names, values as n, v
                pairs = pairs . n . ":" . v . " "
            end
        }
    "#};
    let execution = run(source, &mut EchoConnection::new());
    assert_eq!(execution.variables["pairs"], Value::text("a:1 b:2 "));
}

#[test]
fn parallel_lists_of_different_lengths_fail_at_runtime() {
    let source = indoc! {r#"
        {
            extract /(\w+)-(\w+)/ as both, single from "x-y"
            append "extra" to both
            loop both, single as a, b
            end
        }
    "#};
    let err = parse(source)
        .expect("compile failed")
        .execute(&mut EchoConnection::new())
        .expect_err("expected a length mismatch");
    assert_eq!(err, RuntimeError::ListLengthMismatch { first: 2, other: 1 });
}

#[test]
fn fail_raises_only_when_its_condition_holds() {
    let ok = indoc! {r#"
        {
            x = 1
            fail "x is too big" if x gt 5
        }
    "#};
    assert!(parse(ok)
        .unwrap()
        .execute(&mut EchoConnection::new())
        .is_ok());

    let bad = indoc! {r#"
        {fail "always"}
    "#};
    let err = parse(bad)
        .unwrap()
        .execute(&mut EchoConnection::new())
        .expect_err("expected failure");
    assert_eq!(err, RuntimeError::Fail("always".to_string()));
}

#[test]
fn try_recovers_from_dropped_sessions_but_not_script_failures() {
    struct DropsOnce {
        dropped: bool,
    }
    impl Connection for DropsOnce {
        fn execute(&mut self, command: &str) -> Result<String, ConnectionError> {
            if !self.dropped {
                self.dropped = true;
                return Err(ConnectionError::Closed);
            }
            Ok(command.to_string())
        }
        fn send(&mut self, _: &str) -> Result<(), ConnectionError> {
            Ok(())
        }
    }

    let source = indoc! {r#"
        {
            try
                connection.exec("reload in 5")
            end
            survived = "yes"
        }
    "#};
    let mut conn = DropsOnce { dropped: false };
    let execution = parse(source).unwrap().execute(&mut conn).unwrap();
    assert_eq!(execution.variables["survived"], Value::text("yes"));

    let source = indoc! {r#"
        {
            try
                fail "script bug"
            end
        }
    "#};
    let err = parse(source)
        .unwrap()
        .execute(&mut EchoConnection::new())
        .expect_err("fail must escape try");
    assert_eq!(err, RuntimeError::Fail("script bug".to_string()));
}

#[test]
fn sys_exit_skips_the_rest_of_the_script() {
    let source = indoc! {r#"
        show version
        {
            sys.message("stopping early")
            sys.exit()
        }
        show running-config
    "#};
    let mut conn = EchoConnection::new();
    let execution = run(source, &mut conn);
    assert_eq!(conn.sent(), ["show version"]);
    assert_eq!(execution.messages, ["stopping early"]);
}

#[test]
fn predefined_variables_reach_the_script() {
    let mut compiler = Compiler::new();
    compiler.define("host", Value::text("r9"));
    let program = compiler.compile("ping $host\n").unwrap();
    let mut conn = EchoConnection::new();
    program.execute(&mut conn).unwrap();
    assert_eq!(conn.sent(), ["ping r9"]);
}

#[test]
fn a_compiled_program_can_run_many_hosts() {
    let mut compiler = Compiler::new();
    compiler.define("host", Value::text("placeholder"));
    let template = compiler.compile("ping $host\n{seen = 1}\n").unwrap();

    for host in ["r1", "r2"] {
        let mut program = template.clone();
        program.define("host", Value::text(host));
        let mut conn = EchoConnection::new();
        let execution = program.execute(&mut conn).unwrap();
        assert_eq!(conn.sent(), [format!("ping {host}")]);
        // Each run starts from the program's variables, not the last run's.
        assert_eq!(execution.variables["seen"], Value::int(1));
    }
}

#[test]
fn builtins_compose_inside_expressions() {
    let source = indoc! {r#"
        {
            peers = ipv4.remote_ip(list.new("10.0.0.1", "10.0.0.6"))
            first = list.get(peers, 0)
            shout = string.toupper("ok")
        }
    "#};
    let execution = run(source, &mut EchoConnection::new());
    assert_eq!(
        execution.variables["peers"],
        Value::List(vec![
            Scalar::Text("10.0.0.2".to_string()),
            Scalar::Text("10.0.0.5".to_string()),
        ])
    );
    assert_eq!(execution.variables["first"], Value::text("10.0.0.2"));
    assert_eq!(execution.variables["shout"], Value::text("OK"));
}

#[test]
fn matches_and_conditionals_steer_execution() {
    let source = indoc! {r#"
        show version
        {
            if __response__ matches /IOS/i
                os = "ios"
            else if __response__ matches /JUNOS/
                os = "junos"
            else
                os = "unknown"
            end
        }
    "#};
    let mut conn = EchoConnection::new();
    conn.push_response("Cisco ios Software, Version 15.2");
    let execution = run(source, &mut conn);
    assert_eq!(execution.variables["os"], Value::text("ios"));
}
