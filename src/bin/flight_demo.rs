//! Minimal flight session: start the transmitter, calibrate, and hover in
//! place for a few seconds. Pass `--fly` to actually take off and land.
//!
//! Usage: cargo run --bin flight_demo [--fly] [dest-addr]

use std::time::Duration;

use visuo::{Driver, DriverConfig};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), visuo::Error> {
    env_logger::init();

    let mut fly = false;
    let mut config = DriverConfig::default();
    for arg in std::env::args().skip(1) {
        if arg == "--fly" {
            fly = true;
        } else {
            config.remote = arg.parse().expect("dest-addr must be ip:port");
        }
    }

    let mut drone = Driver::with_config(config);
    drone.on_error(|err| eprintln!("radio: {err}"));
    drone.start().await?;
    println!("transmitting ({drone})");

    drone.calibrate();
    tokio::time::sleep(Duration::from_secs(2)).await;

    if fly {
        println!("taking off");
        drone.take_off();
        tokio::time::sleep(Duration::from_secs(5)).await;

        println!("up, and back down");
        drone.go_up(0.4).await;
        tokio::time::sleep(Duration::from_secs(2)).await;

        println!("landing");
        drone.land();
        tokio::time::sleep(Duration::from_secs(3)).await;
    } else {
        println!("holding neutral for 5 s (pass --fly to take off)");
        tokio::time::sleep(Duration::from_secs(5)).await;
    }

    drone.halt().await;
    println!("done");
    Ok(())
}
