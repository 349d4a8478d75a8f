use seqmidi_io::MidiSystem;

fn main() {
    tracing_subscriber::fmt::init();

    let midi = match MidiSystem::builder().client_name("list-devices").build() {
        Ok(midi) => midi,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    let devices = match midi.devices() {
        Ok(devices) => devices,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    println!("found {} devices", devices.len());
    for dev in &devices {
        println!("{} {} {}", dev.id, dev.name, dev.device_type());
        for stream in &dev.inputs {
            println!("  in:  {}", stream.name);
        }
        for stream in &dev.outputs {
            println!("  out: {}", stream.name);
        }
    }
}
