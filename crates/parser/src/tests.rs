// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

use justina_program::{Machine, Value};
use justina_tokens::program_buffer::{Area, ProgramBuffer};
use justina_tokens::reader::{print_statement, read_token, TokenCursor};
use justina_tokens::{Step, Token, TokenConst};
use justina_types::command::CmdCode;
use justina_types::error::{ParseErr, ParseError};
use justina_types::terminal::TermCode;
use justina_types::Scope;
use pretty_assertions::assert_eq;

use crate::{InputCursor, Parser, StatementInfo};

fn parse_line(machine: &mut Machine, text: &str) -> Result<Vec<StatementInfo>, ParseError> {
    let mut parser = Parser::new(machine, Area::Immediate);
    let mut input = InputCursor::new(text);
    let mut infos = vec![];
    loop {
        match parser.parse_statement(&mut input) {
            Ok(Some(info)) => infos.push(info),
            Ok(None) => break,
            Err(err) => {
                parser.finish(&input).ok();
                return Err(err);
            }
        }
    }
    parser.finish(&input)?;
    Ok(infos)
}

fn parse_program(machine: &mut Machine, text: &str) -> Result<Vec<StatementInfo>, ParseError> {
    let mut parser = Parser::new(machine, Area::Program);
    let mut input = InputCursor::new(text);
    let mut infos = vec![];
    while let Some(info) = parser.parse_statement(&mut input)? {
        parser.machine.record_statement_line(info.line, info.step);
        infos.push(info);
    }
    parser.finish(&input)?;
    Ok(infos)
}

fn statement_tokens(machine: &Machine, step: Step) -> Vec<Token> {
    let mut tokens = vec![];
    for (_, token) in TokenCursor::new(machine.buffer.bytes(), step) {
        tokens.push(token);
        if token.is_semicolon() {
            break;
        }
    }
    tokens
}

#[test]
fn test_parse_declaration_and_expression_statements() {
    let mut machine = Machine::new();
    let infos = parse_line(&mut machine, "var x = 5; x += x * 2; print x;").unwrap();
    assert_eq!(infos.len(), 3);
    assert_eq!(infos[0].cmd, Some(CmdCode::Var));
    assert_eq!(infos[1].cmd, None);
    assert_eq!(infos[2].cmd, Some(CmdCode::Print));

    // the declaration initialized the user variable at parse time
    let variable = machine.variable(Scope::User, 0, 0).unwrap();
    assert_eq!(variable.value, Value::Long(5));

    assert_eq!(
        statement_tokens(&machine, infos[1].step),
        vec![
            Token::Variable {
                scope: Scope::User,
                is_array: false,
                is_const: false,
                name_index: 0,
                value_index: 0,
            },
            Token::Terminal(TermCode::PlusAssign),
            Token::Variable {
                scope: Scope::User,
                is_array: false,
                is_const: false,
                name_index: 0,
                value_index: 0,
            },
            Token::Terminal(TermCode::Mult),
            Token::Constant(TokenConst::Long(2)),
            Token::Terminal(TermCode::Semicolon),
        ]
    );
}

#[test]
fn test_initializer_sign_folding() {
    let mut machine = Machine::new();
    let infos = parse_line(&mut machine, "var x = -2;").unwrap();
    let tokens = statement_tokens(&machine, infos[0].step);
    // the sign is folded into the constant, no prefix operator is emitted
    assert!(tokens.contains(&Token::Constant(TokenConst::Long(-2))));
    assert!(!tokens.contains(&Token::Terminal(TermCode::Minus)));
    assert_eq!(
        machine.variable(Scope::User, 0, 0).unwrap().value,
        Value::Long(-2)
    );

    // at expression level the minus stays a prefix operator
    let infos = parse_line(&mut machine, "x = -2 ^ 2;").unwrap();
    let tokens = statement_tokens(&machine, infos[0].step);
    assert!(tokens.contains(&Token::Terminal(TermCode::Minus)));
    assert!(tokens.contains(&Token::Constant(TokenConst::Long(2))));
}

#[test]
fn test_block_forward_links() {
    let mut machine = Machine::new();
    let infos = parse_line(
        &mut machine,
        "if 1; print 1; elseif 2; print 2; else; print 3; end;",
    )
    .unwrap();

    let if_step = infos[0].step;
    let elseif_step = infos[2].step;
    let else_step = infos[4].step;
    let end_step = infos[6].step;

    let bytes = machine.buffer.bytes();
    let (if_token, _) = read_token(bytes, if_step).unwrap();
    assert_eq!(
        if_token,
        Token::ResWord {
            cmd: CmdCode::If,
            link: Some(elseif_step)
        }
    );
    let (elseif_token, _) = read_token(bytes, elseif_step).unwrap();
    assert_eq!(
        elseif_token,
        Token::ResWord {
            cmd: CmdCode::ElseIf,
            link: Some(else_step)
        }
    );
    let (else_token, _) = read_token(bytes, else_step).unwrap();
    assert_eq!(
        else_token,
        Token::ResWord {
            cmd: CmdCode::Else,
            link: Some(end_step)
        }
    );
    // the end token links back to the block start
    let (end_token, _) = read_token(bytes, end_step).unwrap();
    assert_eq!(
        end_token,
        Token::ResWord {
            cmd: CmdCode::End,
            link: Some(if_step)
        }
    );
}

#[test]
fn test_break_links_to_loop_start() {
    let mut machine = Machine::new();
    let infos = parse_line(
        &mut machine,
        "while 1; if 1; break; end; end;",
    )
    .unwrap();
    let while_step = infos[0].step;
    let break_step = infos[2].step;

    let (break_token, _) = read_token(machine.buffer.bytes(), break_step).unwrap();
    assert_eq!(
        break_token,
        Token::ResWord {
            cmd: CmdCode::Break,
            link: Some(while_step)
        }
    );
}

#[test]
fn test_parse_error_positions() {
    let mut machine = Machine::new();

    // caret belongs under the '1' of the malformed name
    let err = parse_line(&mut machine, "var 1x;").unwrap_err();
    assert_eq!(err.err, ParseErr::NumberInvalidFormat);
    assert_eq!(err.pos, 5);

    let err = parse_line(&mut machine, "print * 2;").unwrap_err();
    assert_eq!(err.err, ParseErr::OperandExpected);
    assert_eq!(err.pos, 7);

    let err = parse_line(&mut machine, "end;").unwrap_err();
    assert_eq!(err.err, ParseErr::NoOpenBlock);

    let err = parse_line(&mut machine, "break;").unwrap_err();
    assert_eq!(err.err, ParseErr::NoOpenLoop);

    let err = parse_line(&mut machine, "2 = 3;").unwrap_err();
    assert_eq!(err.err, ParseErr::AssignmNotAllowedHere);
}

#[test]
fn test_function_definition_and_calls() {
    let mut machine = Machine::new();
    parse_program(
        &mut machine,
        "program demo;\nfunction f(a, b = 10);\nreturn a + b;\nend;\n",
    )
    .unwrap();
    assert_eq!(machine.program_name.as_deref(), Some("demo"));

    let attrs = &machine.functions[0];
    assert!(attrs.is_defined());
    assert_eq!((attrs.min_args, attrs.max_args), (1, 2));
    assert_eq!(attrs.params.len(), 2);
    assert_eq!(
        attrs.params[1].default,
        Some(justina_program::ConstValue::Long(10))
    );

    // calls are checked against the definition
    parse_line(&mut machine, "print f(1); print f(1, 2);").unwrap();
    let err = parse_line(&mut machine, "print f(1, 2, 3);").unwrap_err();
    assert_eq!(err.err, ParseErr::WrongArgCount);
    machine.clear_immediate();

    let err = parse_line(&mut machine, "print f();").unwrap_err();
    assert_eq!(err.err, ParseErr::WrongArgCount);
}

#[test]
fn test_observed_calls_must_fit_later_definition() {
    let mut machine = Machine::new();
    let err = parse_program(
        &mut machine,
        "function g(); return h(1, 2); end;\nfunction h(a); return a; end;\n",
    )
    .unwrap_err();
    assert_eq!(err.err, ParseErr::PrevCallsWrongArgCount);
}

#[test]
fn test_array_declaration_and_use() {
    let mut machine = Machine::new();
    parse_line(&mut machine, "var a(3);").unwrap();
    let variable = machine.variable(Scope::User, 0, 0).unwrap();
    match &variable.value {
        Value::Array(block) => {
            assert_eq!(block.dim_count, 1);
            assert_eq!(block.dims[0], 3);
            assert!(!block.kind_fixed);
        }
        other => panic!("expect an array, got {:?}", other),
    }

    // subscript use with the right dimension count parses
    parse_line(&mut machine, "a(1) = 5;").unwrap();
    let err = parse_line(&mut machine, "a(1, 2) = 5;").unwrap_err();
    assert_eq!(err.err, ParseErr::ArrayUseWrongDimCount);

    machine.clear_immediate();
    let err = parse_line(&mut machine, "var b(0);").unwrap_err();
    assert_eq!(err.err, ParseErr::ArrayDefDimNotValid);
    machine.clear_immediate();
    let err = parse_line(&mut machine, "var b(20, 30);").unwrap_err();
    assert_eq!(err.err, ParseErr::ArrayDefMaxElementsExceeded);
}

#[test]
fn test_for_control_variable_reuse_is_refused() {
    let mut machine = Machine::new();
    let err = parse_line(
        &mut machine,
        "for i = 1 to 3; for i = 1 to 3; end; end;",
    )
    .unwrap_err();
    assert_eq!(err.err, ParseErr::ControlVarInUse);
}

#[test]
fn test_statement_print_reparses_identically() {
    let mut machine = Machine::new();
    let infos = parse_line(
        &mut machine,
        r#"var x = 5; x = x * 2 + 1; print "a\\b", x ^ 2;"#,
    )
    .unwrap();

    let immediate_start = ProgramBuffer::immediate_start();
    let mut printed = String::new();
    for info in &infos {
        printed.push_str(&print_statement(machine.buffer.bytes(), info.step, &machine));
        printed.push(' ');
    }

    let end = machine.buffer.immediate_cursor.index();
    let original: Vec<u8> = machine.buffer.bytes()[immediate_start.index()..end].to_vec();

    let mut second = Machine::new();
    parse_line(&mut second, &printed).unwrap();
    let second_end = second.buffer.immediate_cursor.index();
    let reparsed: Vec<u8> =
        second.buffer.bytes()[immediate_start.index()..second_end].to_vec();

    assert_eq!(original, reparsed);
}

#[test]
fn test_statement_truncation_keeps_counters_clean() {
    let mut machine = Machine::new();
    let cursor = machine.buffer.immediate_cursor;
    let err = parse_line(&mut machine, r#"print "abc" +;"#).unwrap_err();
    assert_eq!(err.err, ParseErr::ExpressionNotComplete);
    machine.discard_tokens_from(Area::Immediate, cursor);

    let report = machine.reset_all();
    assert_eq!(report, Vec::<String>::new());
}

#[test]
fn test_placement_restrictions() {
    let mut machine = Machine::new();
    let err = parse_line(&mut machine, "function f(); end;").unwrap_err();
    assert_eq!(err.err, ParseErr::OnlyInsideProgram);

    let err = parse_line(&mut machine, "static s;").unwrap_err();
    assert_eq!(err.err, ParseErr::OnlyInsideFunction);

    let mut machine = Machine::new();
    let err = parse_program(&mut machine, "print 1;").unwrap_err();
    assert_eq!(err.err, ParseErr::OnlyImmediateOrInFunction);

    let mut machine = Machine::new();
    let err = parse_program(&mut machine, "var g = 1;\nprogram late;").unwrap_err();
    assert_eq!(err.err, ParseErr::OnlyProgramTop);
}
