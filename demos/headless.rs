use estatemap::prelude::*;

fn listing(id: &str, lat: f64, lng: f64, price: u64) -> MapEntity {
    MapEntity::new(id, EntityKind::Listing, lat, lng, format_price(price as f64))
        .with_detail(serde_json::json!({
            "price": price,
            "address": format!("{} King St W", id),
            "beds": 2,
            "baths": 2
        }))
}

/// Example of driving the engine headlessly against the mock widget
#[tokio::main]
async fn main() -> estatemap::Result<()> {
    env_logger::init();

    println!("estatemap headless example");
    println!("==========================");

    let sdk = MockSdk::new();
    let state = ListingMap::builder()
        .surface(Arc::new(MockSurface::new()))
        .sdk_provider(Arc::new(MockSdkProvider::new(sdk.clone())))
        .cluster_provider(Arc::new(MockClusterProvider::ok(60.0)))
        .config(MapConfig::for_testing())
        .entities(vec![
            listing("101", 43.6500, -79.3800, 725_000),
            listing("102", 43.6510, -79.3810, 839_000),
            listing("103", 43.6520, -79.3820, 1_150_000),
            MapEntity::new("b-7", EntityKind::Building, 43.6700, -79.4000, "The Residences"),
        ])
        .mount()
        .await;

    let mut map = match state {
        MountState::Ready(map) => map,
        MountState::Unavailable { reason } => {
            println!("map unavailable: {reason}");
            return Ok(());
        }
    };

    let handles = sdk.last_instance().expect("instance exists");

    println!("mounted:");
    println!("   markers:  {:?}", map.marker_ids());
    println!("   clusters: {:?}", map.cluster_ids());
    println!("   zoom:     {:.2}", map.instance().zoom());

    // Expand the downtown cluster
    if let Some(cluster_id) = map.cluster_ids().first().cloned() {
        println!("\nexpanding cluster {cluster_id}:");
        handles
            .events
            .send(MapEvent::MarkerClicked { id: cluster_id })
            .unwrap();
        map.update(Instant::now());
        println!("   zoom after expand: {:.2}", map.instance().zoom());

        // The viewport settles at the new zoom and grouping recomputes
        let viewport = map.viewport();
        handles
            .events
            .send(MapEvent::Idle {
                bounds: viewport,
                zoom: map.instance().zoom(),
            })
            .unwrap();
        map.update(Instant::now());
        println!("   markers now: {:?}", map.marker_ids());
        println!("   clusters now: {:?}", map.cluster_ids());
    }

    // Click a listing to open the shared detail popover
    if let Some(id) = map.marker_ids().first().cloned() {
        handles
            .events
            .send(MapEvent::MarkerClicked { id: id.clone() })
            .unwrap();
        map.update(Instant::now());
        let panel = handles.state.lock().unwrap().info_panel.clone();
        println!("\nclicked {id}:");
        if let Some((anchor, text)) = panel {
            println!("   popover on {anchor}:");
            for line in text.lines() {
                println!("      {line}");
            }
        }
    }

    map.teardown();
    println!("\ntorn down; live markers: {}", {
        let state = handles.state.lock().unwrap();
        state.live.len()
    });

    Ok(())
}
