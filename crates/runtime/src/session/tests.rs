// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

use pretty_assertions::assert_eq;

use crate::host::MemoryHost;
use crate::session::{Outcome, Session};

fn session() -> Session<MemoryHost> {
    Session::new(MemoryHost::new())
}

fn output_lines(session: &Session<MemoryHost>) -> Vec<String> {
    session
        .host
        .output
        .lines()
        .map(|line| line.to_owned())
        .collect()
}

#[test]
fn test_assignment_and_print() {
    let mut session = session();
    let outcome = session.process_line("var x = 5; x += x * 2; print x;");
    assert_eq!(outcome, Outcome::Done);
    assert!(output_lines(&session).contains(&"15".to_owned()));
}

#[test]
fn test_function_with_default_parameter() {
    let mut session = session();
    session
        .load_program("function f(a, b = 10);\nreturn a + b;\nend;\n")
        .unwrap();
    assert_eq!(session.process_line("print f(1);"), Outcome::Done);
    assert_eq!(session.process_line("print f(1, 2);"), Outcome::Done);
    let lines = output_lines(&session);
    assert!(lines.contains(&"11".to_owned()));
    assert!(lines.contains(&"3".to_owned()));
}

#[test]
fn test_for_loop_prints_each_value() {
    let mut session = session();
    assert_eq!(
        session.process_line("for i = 1 to 3; print i; end;"),
        Outcome::Done
    );
    assert_eq!(output_lines(&session), vec!["1", "2", "3"]);
}

#[test]
fn test_for_loop_iteration_counts() {
    let mut session = session();
    // floor((final - init) / step) + 1 iterations
    session.process_line("var n = 0; for i = 1 to 10 step 3; n += 1; end; print n;");
    session.process_line("n = 0; for j = 5 to 5; n += 1; end; print n;");
    session.process_line("n = 0; for k = 10 to 1 step -4; n += 1; end; print n;");
    session.process_line("n = 0; for m = 5 to 1; n += 1; end; print n;");
    let lines = output_lines(&session);
    let printed: Vec<&String> = lines.iter().filter(|l| l.len() <= 2).collect();
    assert!(lines.contains(&"4".to_owned()));
    assert!(lines.contains(&"1".to_owned()));
    assert!(lines.contains(&"3".to_owned()));
    assert!(lines.contains(&"0".to_owned()));
    let _ = printed;
}

#[test]
fn test_stop_step_go() {
    let mut session = session();
    session
        .load_program(
            "program demo;\nfunction main();\nprint 1;\nstop;\nprint 2;\nprint 3;\nend;\n",
        )
        .unwrap();

    assert_eq!(session.process_line("main();"), Outcome::Stopped);
    assert!(session.engine.is_stopped());
    assert!(session.host.output.contains("stopped for debug"));

    // one statement executes, then the program stops again
    assert_eq!(session.process_line("step;"), Outcome::Stopped);
    assert!(output_lines(&session).contains(&"2".to_owned()));
    assert!(!output_lines(&session).contains(&"3".to_owned()));

    assert_eq!(session.process_line("go;"), Outcome::Done);
    assert!(output_lines(&session).contains(&"3".to_owned()));
    assert!(!session.engine.is_stopped());
}

#[test]
fn test_string_array_and_cleanup() {
    let mut session = session();
    assert_eq!(
        session.process_line(
            r#"var a(3); a(1) = "x"; a(2) = "yz"; print len(a(1)) + len(a(2));"#
        ),
        Outcome::Done
    );
    assert!(output_lines(&session).contains(&"3".to_owned()));

    assert_eq!(session.process_line("clearVars;"), Outcome::Done);
    let report = session.reset();
    assert_eq!(report, Vec::<String>::new());
}

#[test]
fn test_parse_error_caret_position() {
    let mut session = session();
    assert_eq!(session.process_line("var 1x;"), Outcome::ParseError);
    let lines = output_lines(&session);
    assert!(lines[0].contains("1005"));
    assert_eq!(lines[1], "var 1x;");
    // caret under the '1' (column 5)
    assert_eq!(lines[2], "    ^");
}

#[test]
fn test_operator_associativity() {
    let mut session = session();
    session.process_line("var a; var b; a = b = 3; print a + b;");
    session.process_line("print 2 ^ 3 ^ 2;");
    session.process_line("print -2 ^ 2;");
    let lines = output_lines(&session);
    assert!(lines.contains(&"6".to_owned()));
    assert!(lines.contains(&"512".to_owned()));
    assert!(lines.contains(&"-4".to_owned()));
}

#[test]
fn test_scope_shadowing() {
    let mut session = session();
    session
        .load_program(
            "program scopes;\nvar g = 7;\nfunction peek();\nreturn g;\nend;\n\
             function shadow(g);\ng = 100;\nreturn g;\nend;\n",
        )
        .unwrap();
    session.process_line("print shadow(1);");
    session.process_line("print peek();");
    let lines = output_lines(&session);
    // the parameter shadowed the global, the global kept its value
    assert!(lines.contains(&"100".to_owned()));
    assert!(lines.contains(&"7".to_owned()));
}

#[test]
fn test_parameter_write_through() {
    let mut session = session();
    session
        .load_program("function bump(v);\nv += 1;\nreturn 0;\nend;\n")
        .unwrap();
    session.process_line("var x = 41; bump(x); print x;");
    assert!(output_lines(&session).contains(&"42".to_owned()));
}

#[test]
fn test_while_break_continue() {
    let mut session = session();
    session.process_line(
        "var n = 0; var i = 0; while 1; i += 1; if i == 2; continue; end; \
         if i > 4; break; end; n += i; end; print n;",
    );
    // 1 + 3 + 4 = 8 (2 skipped, loop leaves at 5)
    assert!(output_lines(&session).contains(&"8".to_owned()));
}

#[test]
fn test_if_elseif_else_chain() {
    let mut session = session();
    session
        .load_program(
            "function pick(x);\nif x == 1;\nreturn 10;\nelseif x == 2;\nreturn 20;\n\
             else;\nreturn 30;\nend;\nreturn 0;\nend;\n",
        )
        .unwrap();
    session.process_line("print pick(1); print pick(2); print pick(9);");
    let lines = output_lines(&session);
    assert!(lines.contains(&"10".to_owned()));
    assert!(lines.contains(&"20".to_owned()));
    assert!(lines.contains(&"30".to_owned()));
}

#[test]
fn test_trap_captures_error_number() {
    let mut session = session();
    session
        .load_program(
            "function safe();\ntrap 1;\nvar?? nothing;\nreturn err();\nend;\n",
        )
        .unwrap_err();

    // a clean variant: the division error is trapped, err() reports it
    session
        .load_program("function safe();\ntrap 1;\nprint 1 / 0;\nreturn err();\nend;\n")
        .unwrap();
    session.process_line("print safe();");
    // 2008 is the divide-by-zero code
    assert!(output_lines(&session).contains(&"2008".to_owned()));
}

#[test]
fn test_untrapped_error_reports_and_unwinds() {
    let mut session = session();
    session
        .load_program("function boom();\nreturn 1 / 0;\nend;\n")
        .unwrap();
    assert_eq!(session.process_line("print boom();"), Outcome::ExecError);
    assert!(session.host.output.contains("2008"));
    // the machine is usable afterwards and the stacks balanced
    assert_eq!(session.process_line("print 5;"), Outcome::Done);
    let report = session.reset();
    assert_eq!(report, Vec::<String>::new());
}

#[test]
fn test_breakpoint_stops_program() {
    let mut session = session();
    session
        .load_program("program bp;\nfunction main();\nprint 1;\nprint 2;\nend;\n")
        .unwrap();
    // line 4 is 'print 2;'
    assert_eq!(session.process_line("setBP 4;"), Outcome::Done);
    assert_eq!(session.process_line("main();"), Outcome::Stopped);
    assert!(!output_lines(&session).contains(&"2".to_owned()));
    assert_eq!(session.process_line("go;"), Outcome::Done);
    assert!(output_lines(&session).contains(&"2".to_owned()));
}

#[test]
fn test_breakpoint_trigger_expression() {
    let mut session = session();
    session
        .load_program(
            "program bp;\nfunction main();\nfor i = 1 to 5;\nglob = i;\nend;\nreturn glob;\nend;\n\
             var glob = 0;\n",
        )
        .unwrap_err();

    // globals precede functions that use them, loop variables are locals
    session
        .load_program(
            "program bp;\nvar glob = 0;\nfunction main();\nlocal i;\nfor i = 1 to 5;\n\
             glob = i;\nend;\nreturn glob;\nend;\n",
        )
        .unwrap();
    // line 6 is 'glob = i;', only stop when glob reached 3
    assert_eq!(
        session.process_line(r#"setBP 6, "glob == 3";"#),
        Outcome::Done
    );
    assert_eq!(session.process_line("main();"), Outcome::Stopped);
    assert_eq!(session.process_line("print glob;"), Outcome::Done);
    assert!(output_lines(&session).contains(&"3".to_owned()));
    assert_eq!(session.process_line("go;"), Outcome::Done);
}

#[test]
fn test_set_next_line_skips_statements() {
    let mut session = session();
    session
        .load_program(
            "program snl;\nfunction main();\nstop;\nprint 1;\nprint 2;\nprint 3;\nend;\n",
        )
        .unwrap();
    assert_eq!(session.process_line("main();"), Outcome::Stopped);
    // skip 'print 1;' (line 4) and 'print 2;' (line 5), resume at line 6
    assert_eq!(session.process_line("setNextLine 6;"), Outcome::Done);
    assert_eq!(session.process_line("go;"), Outcome::Done);
    let lines = output_lines(&session);
    assert!(!lines.contains(&"1".to_owned()));
    assert!(!lines.contains(&"2".to_owned()));
    assert!(lines.contains(&"3".to_owned()));
}

#[test]
fn test_set_next_line_refuses_jump_into_block() {
    let mut session = session();
    session
        .load_program(
            "program snl;\nfunction main();\nstop;\nif 0;\nprint 1;\nend;\nreturn 0;\nend;\n",
        )
        .unwrap();
    assert_eq!(session.process_line("main();"), Outcome::Stopped);
    // line 5 ('print 1;') is inside the if block
    assert_eq!(session.process_line("setNextLine 5;"), Outcome::ExecError);
    assert!(session.host.output.contains("2022"));
    assert_eq!(session.process_line("go;"), Outcome::Done);
}

#[test]
fn test_last_results_fifo() {
    let mut session = session();
    session.process_line("1 + 1; 2 + 2; 3 + 3;");
    session.process_line("print last(1); print last(3);");
    let lines = output_lines(&session);
    // last(1) is the most recent result (6), last(3) the oldest kept (2)
    assert_eq!(lines[lines.len() - 2], "6");
    assert_eq!(lines[lines.len() - 1], "2");
}

#[test]
fn test_intern_functions() {
    let mut session = session();
    session.process_line(r#"print len("abc"), asc("A"), char(66);"#);
    session.process_line("print min(3, 2), max(1.5, 7);");
    session.process_line("print ifte(1, 10, 20), ifte(0, 10, 20);");
    let output = &session.host.output;
    assert!(output.contains("3"));
    assert!(output.contains("65"));
    assert!(output.contains('B'));
    assert!(output.contains("1020"));
}

#[test]
fn test_callback_roundtrip() {
    let mut session = session();
    session
        .load_program("program cb;\ndeclareCB blink;\n")
        .unwrap();
    assert_eq!(session.process_line("callback blink, 500, 2;"), Outcome::Done);
    assert_eq!(session.host.callback_log.len(), 1);
    assert_eq!(session.host.callback_log[0].0, "blink");

    // an undeclared callback is refused
    assert_eq!(
        session.process_line("callback other, 1;"),
        Outcome::ExecError
    );
    assert!(session.host.output.contains("2033"));
}

#[test]
fn test_quit_outcome() {
    let mut session = session();
    assert_eq!(session.process_line("quit;"), Outcome::Quit);
}

#[test]
fn test_heap_counters_balance_over_session() {
    let mut session = session();
    session
        .load_program(
            "program counters;\nvar s = \"seed\";\nvar arr(4);\n\
             function weave(t);\nlocal u = \"local\";\nreturn t + u;\nend;\n",
        )
        .unwrap();
    session.process_line(r#"var msg = "hello"; print weave(msg + " there");"#);
    session.process_line(r#"arr?? ignore"#);
    session.process_line(r#"print weave("x") + weave("y");"#);
    session.process_line("clearVars;");
    session.process_line("clearProg;");

    let report = session.reset();
    assert_eq!(report, Vec::<String>::new());
}

#[test]
fn test_abort_flag_clears_execution() {
    let mut session = session();
    session
        .load_program(
            "program ab;\nfunction main();\nwhile 1;\nnop;\nend;\nend;\n",
        )
        .unwrap();
    // the host raises the abort flag on the first housekeeping call
    session.host.flags_script.push_back(crate::host::HostFlags {
        abort: true,
        ..Default::default()
    });
    assert_eq!(session.process_line("main();"), Outcome::Aborted);
    assert!(session.host.output.contains("abort"));
    // everything is usable afterwards
    assert_eq!(session.process_line("print 1;"), Outcome::Done);
}

#[test]
fn test_stack_balance_after_statements() {
    let mut session = session();
    session.process_line("var x = 1; x + 2 * 3; print x;");
    assert_eq!(session.engine.eval.len(), 0);
    assert_eq!(session.engine.ops.len(), 0);
    assert_eq!(session.engine.flow.len(), 0);
}
