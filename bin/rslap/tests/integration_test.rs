use assert_cmd::{Command, cargo};

#[test]
fn it_exits_with_2_when_the_targets_file_is_missing() {
    let mut cmd = Command::new(cargo::cargo_bin!("rslap"));

    cmd.arg("--targets=/definitely/not/here.txt").assert().code(2);
}

#[test]
fn it_exits_with_3_on_an_empty_corpus_from_stdin() {
    let mut cmd = Command::new(cargo::cargo_bin!("rslap"));

    cmd.write_stdin("").assert().code(3);
}

#[test]
fn it_exits_with_3_on_broken_target_syntax() {
    let mut cmd = Command::new(cargo::cargo_bin!("rslap"));

    cmd.write_stdin("GIMME /nope\n").assert().code(3);
}

#[test]
fn it_exits_with_2_on_an_inverted_latency_axis() {
    let mut cmd = Command::new(cargo::cargo_bin!("rslap"));

    cmd.write_stdin("GET http://localhost:1/ok\n")
        .arg("--min-y=100")
        .arg("--max-y=10")
        .assert()
        .code(2);
}
