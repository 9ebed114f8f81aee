fn main() {
    if let Err(err) = fleet_telemetry_lib::run() {
        eprintln!("fleet-telemetry: {err:#}");
        std::process::exit(1);
    }
}
