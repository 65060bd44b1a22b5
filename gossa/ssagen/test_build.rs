//
// Copyright (c) 2025-2026 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//
// Unit tests for the SSA builder, driven from source text
//

use super::driver::{build_ssa_source, Options, Output};
use crate::diag;
use crate::error::{ErrorKind, Result};
use crate::ssa::{Aux, BlockKind, Func, Op, Value};
use crate::types::TypeId;
use test_log::test;

fn build(src: &str, name: &str, compile: bool) -> Result<Output> {
    let options = Options {
        compile,
        ..Options::default()
    };
    build_ssa_source(src, "build_test.go", "p", name, &options)
}

fn build_ok(src: &str, name: &str, compile: bool) -> Func {
    match build(src, name, compile) {
        Ok(out) => out.func,
        Err(e) => panic!("building {}: {}", name, e),
    }
}

fn build_err(src: &str, name: &str) -> crate::error::Error {
    match build(src, name, true) {
        Ok(_) => panic!("building {} should fail", name),
        Err(e) => e,
    }
}

fn values(f: &Func, op: Op) -> Vec<&Value> {
    f.live_values().filter(|v| v.op == op).collect()
}

fn ret_blocks(f: &Func) -> Vec<crate::ssa::BlockId> {
    f.blocks()
        .filter(|b| b.kind == BlockKind::Ret)
        .map(|b| b.id)
        .collect()
}

// ============================================================================
// Straight-line code
// ============================================================================

#[test]
fn test_add_one() {
    let src = "package p\n\nfunc addOne(x int) int {\n\treturn x + 1\n}\n";
    let f = build_ok(src, "addOne", true);
    assert_eq!(f.num_blocks(), 1);

    let adds = values(&f, Op::Add);
    assert_eq!(adds.len(), 1);
    let add = adds[0];
    let x = f.value(add.args[0]);
    assert_eq!(x.op, Op::Arg);
    assert!(matches!(&x.aux, Aux::Arg(sym) if sym.name == "x" && sym.offset == 0));
    let one = f.value(add.args[1]);
    assert_eq!(one.op, Op::ConstInt);
    assert_eq!(one.aux_int, 1);

    // the sum is stored to the result slot, which follows x
    let stores = values(&f, Op::Store);
    assert_eq!(stores.len(), 1);
    assert_eq!(stores[0].args[1], add.id);
    let slot = f.value(stores[0].args[0]);
    assert!(matches!(&slot.aux, Aux::Arg(sym) if sym.name == "~r0" && sym.offset == 8));

    let entry = f.block(f.entry);
    assert_eq!(entry.kind, BlockKind::Ret);
    assert_eq!(entry.control, Some(stores[0].id));
}

#[test]
fn test_initial_values() {
    let src = "package p\n\nfunc nothing() {\n}\n";
    let f = build_ok(src, "nothing", false);
    let entry = f.block(f.entry);
    let ops: Vec<Op> = f.block_values(f.entry).map(|v| v.op).collect();
    assert_eq!(&ops[..3], &[Op::InitMem, Op::SP, Op::SB]);
    // frame pointer address
    assert!(f
        .block_values(f.entry)
        .any(|v| matches!(&v.aux, Aux::Arg(sym) if sym.name == ".fp")));
    assert_eq!(entry.kind, BlockKind::Ret);
    assert_eq!(f.value(entry.control.unwrap()).op, Op::InitMem);
}

#[test]
fn test_named_result_zeroed() {
    let src = "package p\n\nfunc named() (r int) {\n\treturn\n}\n";
    let f = build_ok(src, "named", true);
    let zeros = values(&f, Op::Zero);
    assert_eq!(zeros.len(), 1);
    assert_eq!(zeros[0].aux_int, 8);
    let addr = f.value(zeros[0].args[0]);
    assert!(matches!(&addr.aux, Aux::Arg(sym) if sym.name == "r"));
}

#[test]
fn test_dead_code_after_return() {
    let src = "package p\n\nfunc dead() int {\n\treturn 1\n\tx := 2\n\treturn x\n}\n";
    let f = build_ok(src, "dead", false);
    assert_eq!(f.num_blocks(), 2);
    assert_eq!(values(&f, Op::Unknown).len(), 1);

    let f = build_ok(src, "dead", true);
    assert_eq!(f.num_blocks(), 1);
}

// ============================================================================
// Control flow and phis
// ============================================================================

const PICK: &str = "package p

func pick(c bool) int {
	y := 0
	if c {
		y = 1
	} else {
		y = 2
	}
	return y
}
";

#[test]
fn test_if_else_join_phi() {
    let f = build_ok(PICK, "pick", false);
    assert_eq!(f.num_blocks(), 4);

    let phis: Vec<&Value> = values(&f, Op::Phi)
        .into_iter()
        .filter(|v| v.typ == TypeId::INT)
        .collect();
    assert_eq!(phis.len(), 1);
    let phi = phis[0];
    let join = f.block(phi.block);
    assert_eq!(join.preds.len(), 2);
    let consts: Vec<i64> = phi.args.iter().map(|&a| f.value(a).aux_int).collect();
    assert_eq!(consts, vec![1, 2]);
    assert_eq!(join.kind, BlockKind::Ret);
}

#[test]
fn test_if_else_after_compile() {
    let f = build_ok(PICK, "pick", true);
    assert_eq!(f.num_blocks(), 4);
    // the memory phi at the join merges identical states and goes away
    let phis = values(&f, Op::Phi);
    assert_eq!(phis.len(), 1);
    assert_eq!(phis[0].typ, TypeId::INT);
    assert!(values(&f, Op::Copy).is_empty());
}

#[test]
fn test_loop_header_phis() {
    let src = "package p

func sum(n int) int {
	s := 0
	for i := 0; i < n; i++ {
		s += i
	}
	return s
}
";
    let f = build_ok(src, "sum", true);
    assert_eq!(f.num_blocks(), 5);

    let phis = values(&f, Op::Phi);
    assert_eq!(phis.len(), 2);
    let header = phis[0].block;
    for phi in &phis {
        assert_eq!(phi.block, header);
        assert_eq!(phi.typ, TypeId::INT);
        assert_eq!(phi.args.len(), 2);
        let init = f.value(phi.args[0]);
        assert_eq!(init.op, Op::ConstInt);
        assert_eq!(init.aux_int, 0);
        // loop-carried value feeds back into itself
        let next = f.value(phi.args[1]);
        assert_eq!(next.op, Op::Add);
        assert_eq!(next.args[0], phi.id);
    }
    assert_eq!(f.block(header).kind, BlockKind::If);
    assert_eq!(f.block(header).preds.len(), 2);
}

#[test]
fn test_infinite_loop_with_break() {
    let src = "package p

func count() int {
	n := 0
	for {
		n++
		if n > 10 {
			break
		}
	}
	return n
}
";
    let f = build_ok(src, "count", true);
    let phis: Vec<&Value> = values(&f, Op::Phi)
        .into_iter()
        .filter(|v| v.typ == TypeId::INT)
        .collect();
    assert_eq!(phis.len(), 1);
    assert_eq!(ret_blocks(&f).len(), 1);
}

#[test]
fn test_labeled_continue() {
    let src = "package p

func nested(n int) int {
	c := 0
outer:
	for i := 0; i < n; i++ {
		for j := 0; j < n; j++ {
			if j == i {
				continue outer
			}
			c++
		}
	}
	return c
}
";
    let f = build_ok(src, "nested", true);
    assert!(!values(&f, Op::Phi).is_empty());
    assert_eq!(ret_blocks(&f).len(), 1);
}

#[test]
fn test_switch_with_fallthrough() {
    let src = "package p

func sw(x int) int {
	y := 0
	switch x {
	case 1:
		y = 10
		fallthrough
	case 2:
		y += 1
	default:
		y = 5
	}
	return y
}
";
    let f = build_ok(src, "sw", false);
    // entry, two tests, three bodies, exit
    assert_eq!(f.num_blocks(), 7);
    // the first body falls through, so only two clauses reach the exit
    let rets = ret_blocks(&f);
    assert_eq!(rets.len(), 1);
    assert_eq!(f.block(rets[0]).preds.len(), 2);

    // the second body is reached from its test and by fallthrough
    let fall = values(&f, Op::ConstInt)
        .into_iter()
        .find(|v| v.aux_int == 10)
        .map(|v| v.id)
        .unwrap();
    let add = values(&f, Op::Add)
        .into_iter()
        .find(|v| v.typ == TypeId::INT)
        .unwrap();
    assert_eq!(f.block(add.block).preds.len(), 2);
    let phi = f.value(add.args[0]);
    assert_eq!(phi.op, Op::Phi);
    assert!(phi.args.contains(&fall));

    let f = build_ok(src, "sw", true);
    let phis: Vec<&Value> = values(&f, Op::Phi)
        .into_iter()
        .filter(|v| v.typ == TypeId::INT)
        .collect();
    assert_eq!(phis.len(), 2);
    assert!(phis.iter().all(|p| p.args.len() == 2));
}

#[test]
fn test_short_circuit() {
    let src = "package p\n\nfunc both(a bool, b bool) bool {\n\treturn a && b\n}\n";
    let f = build_ok(src, "both", true);
    assert_eq!(f.num_blocks(), 3);
    let phis = values(&f, Op::Phi);
    assert_eq!(phis.len(), 1);
    assert_eq!(phis[0].typ, TypeId::BOOL);
    let args: Vec<Op> = phis[0].args.iter().map(|&a| f.value(a).op).collect();
    assert_eq!(args, vec![Op::Arg, Op::Arg]);
}

const JUMPS: &str = "package p

func jumps(n int, c bool) int {
	s := 0
	for i := 0; i < n; i++ {
		s += i
		if c {
			continue
		} else {
			break
		}
	}
	return s
}

func spin(n int) int {
	s := 0
	for {
		n++
		switch n {
		case 1:
			continue
		default:
			return s
		}
	}
}

func first(n int) int {
	for i := 0; i < n; i++ {
		return i
	}
	return -1
}
";

#[test]
fn test_every_block_reachable() {
    for name in ["jumps", "spin", "first"] {
        let f = build_ok(JUMPS, name, false);
        let orphans: Vec<_> = f
            .blocks()
            .filter(|b| b.id != f.entry && b.preds.is_empty())
            .map(|b| b.id)
            .collect();
        assert!(orphans.is_empty(), "{}: orphan blocks {:?}", name, orphans);
        assert!(
            values(&f, Op::Unknown).is_empty(),
            "{}: reads from unreachable code",
            name
        );
    }
}

#[test]
fn test_jumping_branches_phis() {
    let f = build_ok(JUMPS, "jumps", false);
    // entry, header, body, then, else, latch, exit
    assert_eq!(f.num_blocks(), 7);

    let f = build_ok(JUMPS, "jumps", true);
    for phi in values(&f, Op::Phi) {
        assert!(phi.args.len() >= 2, "trivial phi {} survived", phi.id);
    }
}

// ============================================================================
// Memory
// ============================================================================

#[test]
fn test_address_taken_local() {
    let src = "package p

func addr() int {
	x := 1
	p := &x
	*p = 2
	return x
}
";
    let f = build_ok(src, "addr", true);
    let addrs: Vec<&Value> = values(&f, Op::Addr)
        .into_iter()
        .filter(|v| matches!(&v.aux, Aux::Auto(sym) if sym.name == "x"))
        .collect();
    assert_eq!(addrs.len(), 1);
    let x = addrs[0].id;
    assert_eq!(addrs[0].block, f.entry);

    assert_eq!(values(&f, Op::VarDef).len(), 1);
    let loads = values(&f, Op::Load);
    assert_eq!(loads.len(), 1);
    assert_eq!(loads[0].args[0], x);
    // x := 1, *p = 2 and the result
    assert_eq!(values(&f, Op::Store).len(), 3);
    assert!(values(&f, Op::Phi).is_empty());
}

#[test]
fn test_memory_phi_at_join() {
    let src = "package p

var g int

func setg(c bool) {
	if c {
		g = 1
	}
	g = 2
}
";
    let f = build_ok(src, "setg", true);
    let phis = values(&f, Op::Phi);
    assert_eq!(phis.len(), 1);
    let phi = phis[0];
    assert_eq!(phi.typ, TypeId::MEM);
    let ops: Vec<Op> = phi.args.iter().map(|&a| f.value(a).op).collect();
    assert!(ops.contains(&Op::Store));
    assert!(ops.contains(&Op::InitMem));

    let global = values(&f, Op::Addr)
        .into_iter()
        .find(|v| matches!(&v.aux, Aux::Extern(sym) if sym.name == "g"))
        .unwrap();
    assert_eq!(global.block, f.entry);
    assert_eq!(f.value(global.args[0]).op, Op::SB);
}

#[test]
fn test_array_local() {
    let src = "package p

func arr(i int) int {
	var a [4]int
	a[i] = 7
	return a[i]
}
";
    let f = build_ok(src, "arr", true);
    let zeros = values(&f, Op::Zero);
    assert_eq!(zeros.len(), 1);
    assert_eq!(zeros[0].aux_int, 32);
    assert_eq!(values(&f, Op::VarDef).len(), 1);
    assert_eq!(values(&f, Op::PtrIndex).len(), 2);
    let load = values(&f, Op::Load);
    assert_eq!(load.len(), 1);
    assert_eq!(f.value(load[0].args[0]).op, Op::PtrIndex);
}

#[test]
fn test_static_call() {
    let src = "package p

func double(x int) int {
	return x * 2
}

func useDouble(y int) int {
	return double(y) + 1
}
";
    let f = build_ok(src, "useDouble", true);
    let calls = values(&f, Op::StaticCall);
    assert_eq!(calls.len(), 1);
    assert!(matches!(&calls[0].aux, Aux::Extern(sym) if sym.name == "double"));
    assert_eq!(calls[0].aux_int, 16);

    let loads = values(&f, Op::Load);
    assert_eq!(loads.len(), 1);
    let slot = f.value(loads[0].args[0]);
    assert_eq!(slot.op, Op::OffPtr);
    assert_eq!(slot.aux_int, 8);
    assert_eq!(loads[0].args[1], calls[0].id);
}

#[test]
fn test_string_constant() {
    let src = "package p\n\nfunc greet() string {\n\treturn \"hi\"\n}\n";
    let f = build_ok(src, "greet", true);
    let makes = values(&f, Op::StringMake);
    assert_eq!(makes.len(), 1);
    let data = f.value(makes[0].args[0]);
    assert!(matches!(&data.aux, Aux::Extern(sym) if sym.name == "go.string.\"hi\""));
    assert_eq!(f.value(makes[0].args[1]).aux_int, 2);
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_undefined_goto_label() {
    let src = "package p\n\nfunc f() {\n\tgoto missing\n}\n";
    let e = build_err(src, "f");
    assert_eq!(e.kind(), ErrorKind::LabelError);
    assert!(e.to_string().contains("label missing not defined"));
}

#[test]
fn test_method_rejected() {
    let src = "package p\n\nfunc (t T) m() {}\n";
    let e = build_err(src, "m");
    assert_eq!(e.kind(), ErrorKind::LookupFailure);
    assert!(e.to_string().contains("methods are not supported"));
}

#[test]
fn test_goto_over_declaration() {
    let src = "package p

func jump() int {
	goto L
	x := 1
L:
	return x
}
";
    let e = build_err(src, "jump");
    assert_eq!(e.kind(), ErrorKind::InvariantViolation);
    assert!(e.to_string().contains("incomplete control flow"));
}

#[test]
fn test_unused_label_warns() {
    diag::reset_counts();
    let src = "package p\n\nfunc f() int {\nunused:\n\treturn 1\n}\n";
    let f = build_ok(src, "f", true);
    assert_eq!(f.num_blocks(), 2);
    assert_eq!(diag::warning_count(), 1);
}

#[test]
fn test_unimplemented_statements() {
    let src = "package p\n\nfunc g() {}\n\nfunc f() {\n\tgo g()\n}\n\nfunc h() {\n\tdefer g()\n}\n";
    let e = build_err(src, "f");
    assert_eq!(e.kind(), ErrorKind::Unimplemented);
    assert!(e.to_string().contains("go statement"));
    let e = build_err(src, "h");
    assert_eq!(e.kind(), ErrorKind::Unimplemented);
    assert!(e.to_string().contains("defer statement"));
}

#[test]
fn test_unimplemented_string_ops() {
    let src = "package p

func cat(a string, b string) string {
	return a + b
}

func same(a string, b string) bool {
	return a == b
}
";
    let e = build_err(src, "cat");
    assert_eq!(e.kind(), ErrorKind::Unimplemented);
    assert!(e.to_string().contains("string concatenation"));
    let e = build_err(src, "same");
    assert!(e.to_string().contains("string comparison"));
}
