//! Domain inventory example.
//!
//! Opens a hypervisor connection and prints a summary of every domain.
//!
//! Run with: cargo run --example domain_info -- [URI]
//! The URI defaults to libvirt's built-in test driver.

use libvirt::{Connect, ListDomainsFlags};

fn main() -> libvirt::Result<()> {
    let uri = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "test:///default".to_string());

    println!("=== libvirt domain info ===");

    match libvirt::init() {
        Ok(()) => {}
        Err(libvirt::Error::LibraryLoad(reason)) => {
            println!("libvirt is not available: {}", reason);
            return Ok(());
        }
        Err(e) => return Err(e),
    }
    println!("Library version: {}", libvirt::version()?);

    println!("\n--- Connecting to {} ---", uri);
    let mut conn = Connect::open_read_only(&uri)?;
    println!("Hypervisor: {} {}", conn.hypervisor_type()?, conn.hypervisor_version()?);
    println!("Hostname: {}", conn.hostname()?);

    let node = conn.node_info()?;
    println!(
        "Node: {} with {} CPUs at {} MHz, {} KiB memory",
        node.model, node.cpus, node.mhz, node.memory_kib
    );

    println!("\n--- Domains ---");
    let domains = conn.list_all_domains(ListDomainsFlags::empty())?;
    if domains.is_empty() {
        println!("(none)");
    }

    for domain in &domains {
        let info = domain.info()?;
        let id = match domain.id()? {
            Some(id) => id.to_string(),
            None => "-".to_string(),
        };
        println!("{} (id {})", domain.name()?, id);
        println!("  uuid:    {}", domain.uuid_string()?);
        println!("  state:   {:?}", info.state);
        println!("  vcpus:   {}", info.nr_virt_cpu);
        println!("  memory:  {} / {} KiB", info.memory_kib, info.max_mem_kib);
        println!("  cputime: {} ns", info.cpu_time_ns);

        // Not every driver tracks persistence or autostart.
        match domain.autostart() {
            Ok(autostart) => println!("  autostart: {}", autostart),
            Err(e) if e.is_unsupported() => {}
            Err(e) => return Err(e),
        }
    }

    drop(domains);
    conn.close()?;
    println!("\n--- Done ---");
    Ok(())
}
