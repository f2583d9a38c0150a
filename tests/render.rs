// Integration tests for a full render:
//   dataset loading through the cache, per-mode isolation, composition, output documents

use std::io::{Cursor, Write};

use transitmap::{
    AppConfig, BlockGroupShape, CancelToken, DatasetCache, DatasetLoader, DatasetOutcome, MemFetcher, OfflineFetcher,
    PipelineInputs, RenderOptions, TransitMode, read_geojson, run_pipeline,
};
use zip::{ZipWriter, write::SimpleFileOptions};

const SHAPES_TXT: &str = "shape_id,shape_pt_lat,shape_pt_lon,shape_pt_sequence\n\
    LR1,39.32,-76.62,2\nLR1,39.30,-76.63,1\nLR1,39.34,-76.61,3\n";
const TRIPS_TXT: &str = "route_id,service_id,trip_id,shape_id\nLR,WK,T1,LR1\nLR,WK,T2,LR1\nLR,SA,T3,LR1\n";
const ROUTES_TXT: &str = "route_id,route_short_name,route_long_name\nLR,,Light RailLink\n";
const STOPS_TXT: &str = "stop_id,stop_name,stop_lat,stop_lon\n1,North Avenue,39.31,-76.625\n2,Mt Royal,39.305,-76.62\n";

const BLOCK_GROUPS: &str = r#"{"type": "FeatureCollection", "features": [
    {"properties": {"GEOID": "245100001001"}, "geometry": {"type": "Polygon",
        "coordinates": [[[-76.63, 39.30], [-76.62, 39.30], [-76.62, 39.31], [-76.63, 39.31], [-76.63, 39.30]]]}},
    {"properties": {"GEOID": 240050001001}, "geometry": {"type": "Polygon",
        "coordinates": [[[-76.50, 39.40], [-76.49, 39.40], [-76.49, 39.41], [-76.50, 39.41], [-76.50, 39.40]]]}}
]}"#;

fn feed_zip(tables: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, body) in tables {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(body.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn census_response(county: &str, population: &str) -> String {
    format!(r#"[["NAME","B01003_001E","state","county","tract","block group"],
                ["Block Group 1","{population}","24","{county}","000100","1"]]"#)
}

fn county_url(config: &AppConfig, county: &str) -> String {
    format!(
        "{}?get=NAME,B01003_001E&for=block%20group:*&in=state:24%20county:{county}",
        config.census.api_url(),
    )
}

/// Baltimore City loads, Baltimore County's request fails; Light Rail loads, Metro's feed lacks shapes.
fn setup() -> (AppConfig, Vec<TransitMode>, MemFetcher) {
    let mut config = AppConfig::default();
    config.census.counties = vec!["510".into(), "005".into()];

    let light_rail = TransitMode::new("Light Rail", "https://example.invalid/light-rail.zip", "purple");
    let metro = TransitMode::new("Metro Subway", "https://example.invalid/metro.zip", "red");

    let fetcher = MemFetcher::new()
        .with(&county_url(&config, "510"), census_response("510", "950"))
        .with(&light_rail.url, feed_zip(&[
            ("shapes.txt", SHAPES_TXT), ("trips.txt", TRIPS_TXT), ("routes.txt", ROUTES_TXT), ("stops.txt", STOPS_TXT),
        ]))
        .with(&metro.url, feed_zip(&[("trips.txt", TRIPS_TXT), ("routes.txt", ROUTES_TXT), ("stops.txt", STOPS_TXT)]));

    (config, vec![light_rail, metro], fetcher)
}

fn load(config: &AppConfig, cache: &mut DatasetCache, fetcher: &dyn transitmap::Fetcher, modes: &[TransitMode]) -> PipelineInputs {
    let mut loader = DatasetLoader::new(config, cache, fetcher);
    let population = loader.population();
    let feeds = modes.iter().map(|mode| (mode.clone(), loader.feed(mode))).collect();
    let shapes: Vec<BlockGroupShape> = read_geojson(BLOCK_GROUPS.as_bytes(), "GEOID").unwrap();

    PipelineInputs {
        population: Some(population),
        block_groups: Some(DatasetOutcome::Loaded(shapes)),
        feeds,
    }
}

#[test]
fn partial_inputs_still_render() {
    let (config, modes, fetcher) = setup();
    let mut cache = DatasetCache::in_memory();
    let inputs = load(&config, &mut cache, &fetcher, &modes);

    let result = run_pipeline(inputs, &RenderOptions::from_config(&config), &CancelToken::new()).unwrap();
    let names = result.map.layers().iter().map(|l| l.name.as_str()).collect::<Vec<_>>();
    assert_eq!(names, ["Population Density", "Light Rail Routes", "Light Rail Stops"]);

    // One county failed and one mode failed; both are reported by name.
    let failed = result.report.warnings.iter().map(|w| w.dataset.as_str()).collect::<Vec<_>>();
    assert!(failed.contains(&"county 24005"), "{failed:?}");
    assert!(failed.contains(&"Metro Subway"), "{failed:?}");

    // Three trips on one path draw one line, labelled with the route's long name.
    let routes = result.map.layer("Light Rail Routes").unwrap();
    assert_eq!(routes.len(), 1);
    assert_eq!(routes.features[0].label.as_deref(), Some("Light Rail Route Light RailLink"));
    assert_eq!(result.report.modes[0].referenced_paths, 1);

    // Only the Baltimore City block group has population.
    let density = result.report.density.unwrap();
    assert_eq!(density.retained, 1);
    assert_eq!(density.unmatched, 1);
    assert_eq!(result.map.layer("Population Density").unwrap().len(), 1);
}

#[test]
fn hidden_stops_keep_routes() {
    let (config, modes, fetcher) = setup();
    let mut cache = DatasetCache::in_memory();
    let inputs = load(&config, &mut cache, &fetcher, &modes[..1]);

    let options = RenderOptions { show_stops: false, ..RenderOptions::from_config(&config) };
    let result = run_pipeline(inputs, &options, &CancelToken::new()).unwrap();
    assert!(result.map.layer("Light Rail Routes").is_some());
    assert!(result.map.layer("Light Rail Stops").is_none());
}

#[test]
fn second_run_can_be_served_offline() {
    let (config, modes, fetcher) = setup();
    let dir = tempfile::tempdir().unwrap();

    {
        let mut cache = DatasetCache::on_disk(dir.path());
        load(&config, &mut cache, &fetcher, &modes);
    }
    let requests = fetcher.requests().len();

    let mut cache = DatasetCache::on_disk(dir.path());
    let inputs = load(&config, &mut cache, &OfflineFetcher, &modes[..1]);
    assert!(matches!(inputs.feeds[0].1, DatasetOutcome::Loaded(_)));
    assert!(matches!(inputs.population, Some(DatasetOutcome::Partial { .. })));
    assert_eq!(fetcher.requests().len(), requests);
}

#[test]
fn output_documents_list_every_layer() {
    let (config, modes, fetcher) = setup();
    let mut cache = DatasetCache::in_memory();
    let inputs = load(&config, &mut cache, &fetcher, &modes);
    let mut map = run_pipeline(inputs, &RenderOptions::from_config(&config), &CancelToken::new()).unwrap().map;

    assert!(map.set_visible("Light Rail Stops", false));
    let doc = map.to_geojson();
    let layers = doc["layers"].as_array().unwrap();
    assert_eq!(layers.len(), 3);
    assert_eq!(layers[2]["visible"], false);
    assert_eq!(layers[0]["legend"]["title"], "Population Density (people/km²)");

    let html = map.to_html();
    assert!(html.contains("Light Rail Routes") && html.contains("leaflet"));

    let svg = map.to_svg_string().unwrap();
    assert!(svg.contains(r#"visibility="hidden""#));
}
