fn main() {
    if let Err(err) = libcli::run() {
        eprintln!("{err:#}");
        std::process::exit(exit_code(&err));
    }
}

fn exit_code(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(te) = cause.downcast_ref::<libtargets::TargetError>() {
            return match te {
                libtargets::TargetError::Io(_) => 2,
                _ => 3,
            };
        }
    }
    2
}
