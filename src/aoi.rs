use anyhow::{Context, Result, anyhow};
use geo::{MultiPolygon, Polygon};
use geojson::{Feature, FeatureCollection, GeoJson};
use shapefile::Reader;
use std::convert::TryInto;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{info, warn};

/// The fixed boundary every composite is filtered and clipped to.
#[derive(Debug, Clone)]
pub struct AreaOfInterest {
    pub name: String,
    pub geometry: MultiPolygon<f64>,
    /// Boundary outline handed to the browser as-is.
    pub boundary: FeatureCollection,
}

pub fn load_aoi(path: &Path, name: &str) -> Result<AreaOfInterest> {
    let extension = path.extension()
        .and_then(|e| e.to_str())
        .map(|s: &str| s.to_lowercase())
        .ok_or_else(|| anyhow!("AOI file has no extension: {:?}", path))?;

    let polygons = match extension.as_str() {
        "shp" => load_shapefile_polygons(path)?,
        "json" | "geojson" => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open GeoJSON file: {:?}", path))?;
            let geojson = GeoJson::from_reader(BufReader::new(file))
                .context("Failed to parse AOI GeoJSON")?;
            geojson_polygons(geojson)?
        }
        _ => return Err(anyhow!("Unsupported AOI format: {}", extension)),
    };

    let aoi = from_polygons(name, polygons)?;
    info!(name = %aoi.name, polygons = aoi.geometry.0.len(), "Loaded area of interest");
    Ok(aoi)
}

pub fn aoi_from_geojson_str(name: &str, content: &str) -> Result<AreaOfInterest> {
    let geojson: GeoJson = content.parse().context("Failed to parse AOI GeoJSON")?;
    from_polygons(name, geojson_polygons(geojson)?)
}

fn from_polygons(name: &str, polygons: Vec<Polygon<f64>>) -> Result<AreaOfInterest> {
    if polygons.is_empty() {
        return Err(anyhow!("AOI '{}' contains no polygons", name));
    }
    let geometry = MultiPolygon::new(polygons);

    let mut feature = Feature::from(geojson::Geometry::new(geojson::Value::from(&geometry)));
    feature.set_property("name", name);
    let boundary = FeatureCollection {
        bbox: None,
        features: vec![feature],
        foreign_members: None,
    };

    Ok(AreaOfInterest { name: name.to_string(), geometry, boundary })
}

fn geojson_polygons(geojson: GeoJson) -> Result<Vec<Polygon<f64>>> {
    let geometries: Vec<geojson::Geometry> = match geojson {
        GeoJson::FeatureCollection(fc) => fc.features.into_iter().filter_map(|f| f.geometry).collect(),
        GeoJson::Feature(f) => f.geometry.into_iter().collect(),
        GeoJson::Geometry(g) => vec![g],
    };

    let mut polygons = Vec::new();
    for geom in geometries {
        let valid_geo: geo::Geometry<f64> = geom.value.try_into()
            .map_err(|e| anyhow!("Failed to convert geojson geometry: {:?}", e))?;
        match valid_geo {
            geo::Geometry::Polygon(p) => polygons.push(p),
            geo::Geometry::MultiPolygon(mp) => polygons.extend(mp),
            _ => warn!("Skipping non-polygon geometry in AOI"),
        }
    }
    Ok(polygons)
}

fn load_shapefile_polygons(path: &Path) -> Result<Vec<Polygon<f64>>> {
    let mut reader = Reader::from_path(path)
        .with_context(|| format!("Failed to open Shapefile: {:?}", path))?;

    let mut polygons = Vec::new();
    for result in reader.iter_shapes_and_records() {
        let (shape, _record) = result?;
        let mp: MultiPolygon<f64> = match shape {
            shapefile::Shape::Polygon(polygon) => polygon.try_into()
                .map_err(|e| anyhow!("Failed to convert polygon: {:?}", e))?,
            shapefile::Shape::PolygonM(polygon) => polygon.try_into()
                .map_err(|e| anyhow!("Failed to convert polygonM: {:?}", e))?,
            shapefile::Shape::PolygonZ(polygon) => polygon.try_into()
                .map_err(|e| anyhow!("Failed to convert polygonZ: {:?}", e))?,
            _ => continue,
        };
        polygons.extend(mp);
    }
    Ok(polygons)
}
