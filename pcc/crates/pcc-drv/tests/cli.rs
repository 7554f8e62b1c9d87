//! End-to-end driver tests: compile real programs and inspect the
//! produced artifacts. Execution is the job of an external harness (the
//! output is AArch64 code); these tests check exit status, container
//! shape, and assembly output.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;

fn pcc() -> Command {
    Command::cargo_bin("pcc").unwrap()
}

fn write_source(dir: &Path, name: &str, text: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, text).unwrap();
    path
}

/// The six canonical programs; each pins an expected exit code when run
/// under an emulator.
const PROGRAMS: &[(&str, &str)] = &[
    ("ret42.c", "int main(){ return 42; }"),
    ("squares.c", "int main(){ int a=3; int b=4; return a*a+b*b; }"),
    (
        "call.c",
        "int add(int x,int y){ return x+y; } int main(){ return add(17, 25); }",
    ),
    (
        "for_sum.c",
        "int main(){ int s=0; for(int i=1; i<=10; i=i+1) s = s+i; return s; }",
    ),
    (
        "factorial.c",
        "int main(){ int n=6; int f=1; while(n>1){ f=f*n; n=n-1; } return f; }",
    ),
    (
        "shortcircuit.c",
        "int main(){ int a=5; if(a>3 && a<10) return 1; else return 0; }",
    ),
];

#[test]
fn canonical_programs_compile_to_elf() {
    let dir = tempfile::tempdir().unwrap();
    for (name, text) in PROGRAMS {
        let src = write_source(dir.path(), name, text);
        let out = dir.path().join(format!("{name}.bin"));
        pcc()
            .arg(&src)
            .arg("-o")
            .arg(&out)
            .assert()
            .success();
        let image = fs::read(&out).unwrap();
        assert_eq!(&image[0..4], b"\x7fELF", "{name} is not an ELF image");
        assert_eq!(image[18], 183, "{name} must target EM_AARCH64");
    }
}

#[test]
fn canonical_programs_compile_optimized_too() {
    let dir = tempfile::tempdir().unwrap();
    for (name, text) in PROGRAMS {
        let src = write_source(dir.path(), name, text);
        let plain = dir.path().join(format!("{name}.o0"));
        let folded = dir.path().join(format!("{name}.o1"));
        pcc().arg(&src).arg("-o").arg(&plain).assert().success();
        pcc()
            .arg(&src)
            .args(["-O", "1"])
            .arg("-o")
            .arg(&folded)
            .assert()
            .success();
        // folding only ever removes instructions
        assert!(
            fs::metadata(&folded).unwrap().len() <= fs::metadata(&plain).unwrap().len(),
            "{name}: -O1 grew the image"
        );
    }
}

#[test]
fn assembly_mode_emits_text() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_source(dir.path(), "ret.c", "int main(){ return 42; }");
    let out = dir.path().join("ret.s");
    pcc().arg(&src).arg("-S").arg("-o").arg(&out).assert().success();
    let asm = fs::read_to_string(&out).unwrap();
    assert!(asm.contains(".global _start"));
    assert!(asm.contains("main:"));
    assert!(asm.contains("mov x0, #42"));
    assert!(asm.contains("ret"));
}

#[test]
fn bare_platform_emits_a_flat_image() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_source(dir.path(), "bare.c", "int main(){ return 7; }");
    let out = dir.path().join("bare.bin");
    pcc()
        .arg(&src)
        .args(["-p", "bare"])
        .arg("-o")
        .arg(&out)
        .assert()
        .success();
    let image = fs::read(&out).unwrap();
    assert_ne!(&image[0..4], b"\x7fELF", "bare output must not be wrapped");
    assert_eq!(image.len() % 4, 0);
}

#[test]
fn shared_flag_switches_elf_type() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_source(dir.path(), "lib.c", "int one(){ return 1; } int main(){ return one(); }");
    let exe = dir.path().join("exe");
    let so = dir.path().join("so");
    pcc().arg(&src).arg("-o").arg(&exe).assert().success();
    pcc().arg(&src).arg("--shared").arg("-o").arg(&so).assert().success();
    let exe = fs::read(&exe).unwrap();
    let so = fs::read(&so).unwrap();
    assert_eq!(u16::from_le_bytes([exe[16], exe[17]]), 2, "ET_EXEC");
    assert_eq!(u16::from_le_bytes([so[16], so[17]]), 3, "ET_DYN");
}

#[test]
fn includes_expand_before_lexing() {
    let dir = tempfile::tempdir().unwrap();
    write_source(dir.path(), "add.c", "int add(int x, int y){ return x+y; }");
    let src = write_source(
        dir.path(),
        "main.c",
        "#include <add.c>\nint main(){ return add(40, 2); }",
    );
    let out = dir.path().join("inc.bin");
    pcc().arg(&src).arg("-o").arg(&out).assert().success();
    assert!(fs::metadata(&out).unwrap().len() > 0);
}

#[test]
fn extern_calls_bind_to_syscall_stubs() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_source(
        dir.path(),
        "fork.c",
        "extern int fork(); int main(){ int pid = fork(); if (pid == 0) return 1; return 0; }",
    );
    let out = dir.path().join("fork.bin");
    pcc().arg(&src).arg("-o").arg(&out).assert().success();
}

#[test]
fn parse_errors_name_the_lexeme() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_source(dir.path(), "bad.c", "int main(){ return x; }");
    pcc()
        .arg(&src)
        .assert()
        .failure()
        .stderr(predicate::str::contains("undefined identifier `x`"));
}

#[test]
fn lex_errors_are_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_source(dir.path(), "pipe.c", "int main(){ if (1<2 | 2<3) return 1; return 0; }");
    pcc()
        .arg(&src)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unexpected character `|`"));
}

#[test]
fn x86_64_is_a_declared_placeholder() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_source(dir.path(), "x.c", "int main(){ return 0; }");
    pcc()
        .arg(&src)
        .args(["-a", "x86_64"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not implemented"));
}

#[test]
fn macos_binary_output_requires_external_writer() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_source(dir.path(), "m.c", "int main(){ return 0; }");
    pcc().arg(&src).args(["-p", "macos"]).assert().failure();
    // but assembly mode still works
    let out = dir.path().join("m.s");
    pcc()
        .arg(&src)
        .args(["-p", "macos", "-S"])
        .arg("-o")
        .arg(&out)
        .assert()
        .success();
    assert!(fs::read_to_string(&out).unwrap().contains("svc #0x80"));
}

#[test]
fn missing_source_fails_cleanly() {
    pcc()
        .arg("does-not-exist.c")
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot read source file"));
}

#[test]
fn version_and_help() {
    pcc().arg("-V").assert().success();
    pcc()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("-O"))
        .stdout(predicate::str::contains("-S"));
}
