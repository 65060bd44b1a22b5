//
// Copyright (c) 2025-2026 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//
// Parser tests
//

use super::ast::*;
use super::parse_file;
use crate::strings::StringTable;

fn parse(src: &str) -> (SourceFile, StringTable) {
    let mut strings = StringTable::new();
    let file = parse_file(src, 0, &mut strings).unwrap();
    (file, strings)
}

fn parse_err(src: &str) -> String {
    let mut strings = StringTable::new();
    parse_file(src, 0, &mut strings).unwrap_err().message
}

fn only_func(file: &SourceFile) -> &FuncDecl {
    match &file.decls[..] {
        [Decl::Func(f)] => f,
        other => panic!("expected one func, got {:?}", other),
    }
}

#[test]
fn test_package_and_imports() {
    let (file, strings) = parse("package main\n\nimport \"fmt\"\nimport (\n\t\"os\"\n\t\"io\"\n)\n");
    assert_eq!(strings.get(file.package.name), "main");
    let paths: Vec<&str> = file.imports.iter().map(|(p, _)| p.as_str()).collect();
    assert_eq!(paths, vec!["fmt", "os", "io"]);
    assert!(file.decls.is_empty());
}

#[test]
fn test_func_signature() {
    let (file, strings) = parse("package p\nfunc f(a, b int, c *bool) (r int) { return }\n");
    let f = only_func(&file);
    assert_eq!(strings.get(f.name.name), "f");
    let names: Vec<&str> = f
        .params
        .iter()
        .map(|p| strings.get(p.name.unwrap().name))
        .collect();
    assert_eq!(names, vec!["a", "b", "c"]);
    assert!(matches!(f.params[0].typ, TypeExpr::Name(..)));
    assert!(matches!(f.params[2].typ, TypeExpr::Pointer(_)));
    assert_eq!(f.results.len(), 1);
    assert_eq!(strings.get(f.results[0].name.unwrap().name), "r");
    assert!(f.recv.is_none());
}

#[test]
fn test_unnamed_params_and_receiver() {
    let (file, _) = parse("package p\nfunc (t T) m(int, bool) int { return 0 }\n");
    let f = only_func(&file);
    assert!(f.recv.is_some());
    assert_eq!(f.params.len(), 2);
    assert!(f.params.iter().all(|p| p.name.is_none()));
    assert_eq!(f.results.len(), 1);
}

#[test]
fn test_precedence() {
    let (file, _) = parse("package p\nfunc f(a, b, c int) bool { return a+b*c > 0 && c < 2 }\n");
    let f = only_func(&file);
    let body = f.body.as_ref().unwrap();
    let StmtKind::Return(values) = &body.stmts[0].kind else {
        panic!("expected return");
    };
    let ExprKind::Binary { op, left, .. } = &values[0].kind else {
        panic!("expected binary");
    };
    assert_eq!(*op, BinaryOp::LogAnd);
    let ExprKind::Binary { op, left, .. } = &left.kind else {
        panic!("expected comparison");
    };
    assert_eq!(*op, BinaryOp::Gt);
    let ExprKind::Binary { op, right, .. } = &left.kind else {
        panic!("expected add");
    };
    assert_eq!(*op, BinaryOp::Add);
    assert!(matches!(right.kind, ExprKind::Binary { op: BinaryOp::Mul, .. }));
}

#[test]
fn test_statements() {
    let src = r#"package p
func f(x int) int {
	var y int
	z := x
	y, z = z, y
	z += 2
	z++
	if t := z; t > 0 {
		y = 1
	} else if z < 0 {
		y = 2
	} else {
		y = 3
	}
	for i := 0; i < 10; i++ {
		continue
	}
	for {
		break
	}
	switch z {
	case 1, 2:
		fallthrough
	default:
		y = 4
	}
L:
	goto L
}
"#;
    let (file, _) = parse(src);
    let body = only_func(&file).body.as_ref().unwrap();
    let kinds: Vec<&'static str> = body.stmts.iter().map(|s| s.kind.describe()).collect();
    assert_eq!(
        kinds,
        vec![
            "var declaration",
            "short variable declaration",
            "assignment",
            "assignment",
            "inc/dec statement",
            "if statement",
            "for statement",
            "for statement",
            "switch statement",
            "labeled statement",
        ]
    );

    let StmtKind::Switch { tag, clauses, .. } = &body.stmts[8].kind else {
        panic!("expected switch");
    };
    assert!(tag.is_some());
    assert_eq!(clauses.len(), 2);
    assert_eq!(clauses[0].exprs.len(), 2);
    assert!(clauses[1].is_default);

    let StmtKind::Labeled { stmt, .. } = &body.stmts[9].kind else {
        panic!("expected label");
    };
    assert!(matches!(stmt.kind, StmtKind::Goto(_)));
}

#[test]
fn test_if_init_and_else_chain() {
    let (file, _) = parse("package p\nfunc f(x int) {\n\tif y := x; y > 1 {\n\t} else if x > 2 {\n\t}\n}\n");
    let body = only_func(&file).body.as_ref().unwrap();
    let StmtKind::If { init, els, .. } = &body.stmts[0].kind else {
        panic!("expected if");
    };
    assert!(matches!(
        init.as_deref().map(|s| &s.kind),
        Some(StmtKind::Define { .. })
    ));
    assert!(matches!(
        els.as_deref().map(|s| &s.kind),
        Some(StmtKind::If { .. })
    ));
}

#[test]
fn test_array_types_and_index() {
    let (file, _) = parse("package p\nvar g [4]int\nfunc f() int {\n\tvar a [2][3]int\n\ta[1][2] = g[0]\n\treturn a[1][2]\n}\n");
    assert_eq!(file.decls.len(), 2);
    let Decl::Var(spec) = &file.decls[0] else {
        panic!("expected var");
    };
    assert!(matches!(spec.typ, Some(TypeExpr::Array(4, _))));
}

#[test]
fn test_labeled_empty_statement() {
    let (file, _) = parse("package p\nfunc f() {\n\tgoto end\nend:\n}\n");
    let body = only_func(&file).body.as_ref().unwrap();
    let StmtKind::Labeled { stmt, .. } = &body.stmts[1].kind else {
        panic!("expected label");
    };
    assert!(matches!(stmt.kind, StmtKind::Empty));
}

#[test]
fn test_node_ids_unique() {
    let (file, _) = parse("package p\nfunc f(a int) int { b := a + 1; return b * 2 }\n");
    let f = only_func(&file);
    let body = f.body.as_ref().unwrap();
    let mut ids = vec![f.id, body.id];
    for s in &body.stmts {
        ids.push(s.id);
    }
    let len = ids.len();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), len);
}

#[test]
fn test_go_and_defer() {
    let (file, _) = parse("package p\nfunc g() {}\nfunc f() {\n\tgo g()\n\tdefer g()\n}\n");
    let Decl::Func(f) = &file.decls[1] else {
        panic!("expected func");
    };
    let body = f.body.as_ref().unwrap();
    assert!(matches!(body.stmts[0].kind, StmtKind::Go(_)));
    assert!(matches!(body.stmts[1].kind, StmtKind::Defer(_)));
}

#[test]
fn test_syntax_errors() {
    assert!(parse_err("func f() {}").contains("expected package"));
    assert!(parse_err("package p\nfunc f() { x := }\n").contains("expected expression"));
    assert!(parse_err("package p\nfunc f() { for x := range y {} }\n").contains("range"));
    assert!(parse_err("package p\nfunc f(a int, bool) {}\n").contains("mixed named"));
    assert!(parse_err("package p\ntype T int\n").contains("func or var"));
    assert!(parse_err("package p\nfunc f() { select {} }\n").contains("not supported"));
}

#[test]
fn test_errors_compare_structurally() {
    let mut s1 = StringTable::new();
    let mut s2 = StringTable::new();
    let e1 = parse_file("package p\nfunc f() { x := }\n", 0, &mut s1).unwrap_err();
    let e2 = parse_file("package p\nfunc f() { x := }\n", 0, &mut s2).unwrap_err();
    assert_eq!(e1, e2);
}
