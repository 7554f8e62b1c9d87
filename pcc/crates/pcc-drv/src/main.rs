fn main() {
    if let Err(e) = pcc_drv::main() {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
