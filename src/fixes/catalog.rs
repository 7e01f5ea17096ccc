//! The named fix library.
//!
//! Names are what the rules book stores and what the history attribute
//! records, so renaming an entry is a data migration.
use chrono::Utc;
use uuid::Uuid;

use crate::identity::FixTarget;
use crate::netcdf::{AttrType, AttrValue};

use super::{
    AddRule, AttributeTarget, CopyRule, DataTransform, FixDescriptor, FixOperation, Literal,
    ScopeRule, UpdateRule,
};

const CMIP6_LICENSE: &str = "CMIP6 model data produced by the contributing institution is \
licensed under a Creative Commons Attribution-ShareAlike 4.0 International License \
(https://creativecommons.org/licenses). Consult https://pcmdi.llnl.gov/CMIP6/TermsOfUse \
for terms of use governing CMIP6 output, including citation requirements and proper \
acknowledgment. The data producers and data providers make no warranty, either express \
or implied, including, but not limited to, warranties of merchantability and fitness \
for a particular purpose.";

const fn add(name: &'static str, target: AttributeTarget, literal: Literal) -> FixDescriptor {
    let attr_type = match literal {
        Literal::Text(_) => AttrType::Char,
        Literal::Double(_) => AttrType::Double,
        Literal::Int(_) => AttrType::Int,
    };
    FixDescriptor {
        name,
        operation: FixOperation::Add {
            target,
            attr_type,
            rule: AddRule::Constant(literal),
        },
    }
}

const fn add_text(name: &'static str, target: AttributeTarget, text: &'static str) -> FixDescriptor {
    add(name, target, Literal::Text(text))
}

const fn generated(
    name: &'static str,
    target: AttributeTarget,
    generate: fn(&FixTarget) -> AttrValue,
) -> FixDescriptor {
    FixDescriptor {
        name,
        operation: FixOperation::Add {
            target,
            attr_type: AttrType::Char,
            rule: AddRule::Generated(generate),
        },
    }
}

const fn update(
    name: &'static str,
    target: AttributeTarget,
    attr_type: AttrType,
    rule: UpdateRule,
) -> FixDescriptor {
    FixDescriptor {
        name,
        operation: FixOperation::Update {
            target,
            attr_type,
            rule,
        },
    }
}

const fn to_double(name: &'static str, attribute: &'static str) -> FixDescriptor {
    update(
        name,
        AttributeTarget::global(attribute),
        AttrType::Double,
        UpdateRule::CoerceDouble,
    )
}

const fn to_int(name: &'static str, attribute: &'static str) -> FixDescriptor {
    update(
        name,
        AttributeTarget::global(attribute),
        AttrType::Int,
        UpdateRule::CoerceInt,
    )
}

const fn replace_text(
    name: &'static str,
    target: AttributeTarget,
    expected: &'static str,
    replacement: &'static str,
) -> FixDescriptor {
    update(
        name,
        target,
        AttrType::Char,
        UpdateRule::ReplaceExpected {
            expected: Literal::Text(expected),
            replacement: Literal::Text(replacement),
        },
    )
}

const fn copy(
    name: &'static str,
    target: AttributeTarget,
    attr_type: AttrType,
    rule: CopyRule,
) -> FixDescriptor {
    FixDescriptor {
        name,
        operation: FixOperation::Copy {
            target,
            attr_type,
            rule,
        },
    }
}

const fn copy_global(
    name: &'static str,
    source: &'static str,
    destination: &'static str,
) -> FixDescriptor {
    copy(
        name,
        AttributeTarget::global(destination),
        AttrType::Char,
        CopyRule::Global { source },
    )
}

const fn delete(name: &'static str, target: AttributeTarget) -> FixDescriptor {
    FixDescriptor {
        name,
        operation: FixOperation::Delete { target },
    }
}

const fn data(name: &'static str, transform: DataTransform) -> FixDescriptor {
    FixDescriptor {
        name,
        operation: FixOperation::Data(transform),
    }
}

fn new_tracking_id(_target: &FixTarget) -> AttrValue {
    AttrValue::Text(format!("hdl:21.14100/{}", Uuid::new_v4()))
}

fn creation_date_now(_target: &FixTarget) -> AttrValue {
    AttrValue::Text(Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string())
}

const fn global(attribute: &'static str) -> AttributeTarget {
    AttributeTarget::global(attribute)
}

const fn lead(attribute: &'static str) -> AttributeTarget {
    AttributeTarget::lead_variable(attribute)
}

static CATALOG: &[FixDescriptor] = &[
    // Numeric coercion of global attributes.
    to_double("ParentBranchTimeDoubleFix", "branch_time_in_parent"),
    to_double("ChildBranchTimeDoubleFix", "branch_time_in_child"),
    to_int("RealizationIndexIntFix", "realization_index"),
    to_int("InitializationIndexIntFix", "initialization_index"),
    to_int("PhysicsIndexIntFix", "physics_index"),
    to_int("ForcingIndexIntFix", "forcing_index"),
    // URL protocol rewrites.
    update(
        "FurtherInfoUrlToHttps",
        global("further_info_url"),
        AttrType::Char,
        UpdateRule::HttpsProtocol,
    ),
    update(
        "FurtherInfoUrlAwiSourceIdAndHttps",
        global("further_info_url"),
        AttrType::Char,
        UpdateRule::HttpsProtocolWithToken {
            token: "AWI-CM-1-0",
            source: "source_id",
        },
    ),
    update(
        "FurtherInfoUrlEcEarthSourceIdAndHttps",
        global("further_info_url"),
        AttrType::Char,
        UpdateRule::HttpsProtocolWithToken {
            token: "EC-Earth3",
            source: "source_id",
        },
    ),
    // Validated constant replacements.
    replace_text(
        "ProductOutputToModelOutput",
        global("product"),
        "output",
        "model-output",
    ),
    replace_text(
        "MipEraCmip5ToCmip6",
        global("mip_era"),
        "CMIP5",
        "CMIP6",
    ),
    replace_text(
        "GridLabelGrToGn",
        global("grid_label"),
        "gr",
        "gn",
    ),
    // Copies between attributes.
    copy_global("ParentSourceIdFromSourceId", "source_id", "parent_source_id"),
    copy_global(
        "ParentActivityIdFromActivityId",
        "activity_id",
        "parent_activity_id",
    ),
    copy_global(
        "ParentVariantLabelFromVariantLabel",
        "variant_label",
        "parent_variant_label",
    ),
    copy(
        "FillValueFromMissingValue",
        lead("_FillValue"),
        AttrType::Float,
        CopyRule::Variable {
            variable: ScopeRule::LeadVariable,
            source: "missing_value",
        },
    ),
    copy(
        "MissingValueFromFillValue",
        lead("missing_value"),
        AttrType::Double,
        CopyRule::Variable {
            variable: ScopeRule::LeadVariable,
            source: "_FillValue",
        },
    ),
    // Generated values.
    generated("TrackingIdNew", global("tracking_id"), new_tracking_id),
    generated(
        "CreationDateNow",
        global("creation_date"),
        creation_date_now,
    ),
    // Global constants.
    add_text("DataSpecsVersionAdd", global("data_specs_version"), "01.00.23"),
    add_text("ProductAdd", global("product"), "model-output"),
    add_text("MipEraAdd", global("mip_era"), "CMIP6"),
    add_text("ActivityIdHighResMip", global("activity_id"), "HighResMIP"),
    add_text("ConventionsCf17Cmip62", global("Conventions"), "CF-1.7 CMIP-6.2"),
    add_text("LicenseCmip6", global("license"), CMIP6_LICENSE),
    add_text(
        "EcEarthInstitution",
        global("institution"),
        "AEMET, Spain; BSC, Spain; CNR-ISAC, Italy; DMI, Denmark; ENEA, Italy; FMI, \
         Finland; Geomar, Germany; ICHEC, Ireland; ICTP, Italy; IDL, Portugal; IMAU, The \
         Netherlands; IPMA, Portugal; KIT, Karlsruhe, Germany; KNMI, The Netherlands; Lund \
         University, Sweden; Met Eireann, Ireland; NLeSC, The Netherlands; NTNU, Norway; \
         Oxford University, UK; surfSARA, The Netherlands; SMHI, Sweden; Stockholm \
         University, Sweden; Unite ASTR, Belgium; University College Dublin, Ireland; \
         University of Bergen, Norway; University of Copenhagen, Denmark; University of \
         Helsinki, Finland; University of Santiago de Compostela, Spain; Uppsala \
         University, Sweden; Utrecht University, The Netherlands; Vrije Universiteit \
         Amsterdam, the Netherlands; Wageningen University, The Netherlands",
    ),
    add_text(
        "EcEarthInstitutionId",
        global("institution_id"),
        "EC-Earth-Consortium",
    ),
    add_text(
        "HadGem3Institution",
        global("institution"),
        "Met Office Hadley Centre, Fitzroy Road, Exeter, Devon, EX1 3PB, UK",
    ),
    add_text(
        "CmccInstitution",
        global("institution"),
        "Fondazione Centro Euro-Mediterraneo sui Cambiamenti Climatici, Lecce 73100, Italy",
    ),
    add_text(
        "MpiInstitution",
        global("institution"),
        "Max Planck Institute for Meteorology, Hamburg 20146, Germany",
    ),
    add_text("NominalResolution25km", global("nominal_resolution"), "25 km"),
    add_text("NominalResolution50km", global("nominal_resolution"), "50 km"),
    add_text("NominalResolution100km", global("nominal_resolution"), "100 km"),
    add_text("SourceTypeAogcm", global("source_type"), "AOGCM"),
    add_text("GridLabelGn", global("grid_label"), "gn"),
    add_text("GridLabelGr", global("grid_label"), "gr"),
    add_text("RealmAtmos", global("realm"), "atmos"),
    add_text("RealmOcean", global("realm"), "ocean"),
    add_text("FrequencyMon", global("frequency"), "mon"),
    add_text("FrequencyDay", global("frequency"), "day"),
    add_text("Frequency6hr", global("frequency"), "6hr"),
    add("BranchTimeInParentZero", global("branch_time_in_parent"), Literal::Double(0.0)),
    // Lead-variable constants.
    add_text("CellMethodsAreaMeanTimeMean", lead("cell_methods"), "area: time: mean"),
    add_text("CellMethodsAreaMeanTimeMinimum", lead("cell_methods"), "area: mean time: minimum"),
    add_text("CellMethodsAreaMeanTimeMaximum", lead("cell_methods"), "area: mean time: maximum"),
    add_text("CellMethodsAreaMeanTimePoint", lead("cell_methods"), "area: mean time: point"),
    add_text("CellMeasuresAreacella", lead("cell_measures"), "area: areacella"),
    add_text("CellMeasuresAreacello", lead("cell_measures"), "area: areacello"),
    add_text(
        "CellMeasuresAreacelloVolcello",
        lead("cell_measures"),
        "area: areacello volume: volcello",
    ),
    add_text("StandardNameAirTemperature", lead("standard_name"), "air_temperature"),
    add_text(
        "StandardNameSeaSurfaceTemperature",
        lead("standard_name"),
        "sea_surface_temperature",
    ),
    add_text("StandardNamePrecipitationFlux", lead("standard_name"), "precipitation_flux"),
    add_text("LongNameNearSurfaceAirTemperature", lead("long_name"), "Near-Surface Air Temperature"),
    add_text("UnitsKelvin", lead("units"), "K"),
    add_text("UnitsDegC", lead("units"), "degC"),
    add_text("UnitsKgM2S1", lead("units"), "kg m-2 s-1"),
    add_text("UnitsPa", lead("units"), "Pa"),
    // Named-coordinate constants.
    add_text("LatUnitsDegreesNorth", AttributeTarget::variable("lat", "units"), "degrees_north"),
    add_text("LonUnitsDegreesEast", AttributeTarget::variable("lon", "units"), "degrees_east"),
    add_text("TimeCalendarGregorian", AttributeTarget::variable("time", "calendar"), "gregorian"),
    // Deletions.
    delete("BranchTimeDelete", global("branch_time")),
    delete("ExternalVariablesDelete", global("external_variables")),
    delete("VarCommentDelete", lead("comment")),
    delete("VarHistoryDelete", lead("history")),
    delete("VarCoordinatesDelete", lead("coordinates")),
    delete("VarCellMeasuresDelete", lead("cell_measures")),
    delete("VarValidMinDelete", lead("valid_min")),
    delete("VarValidMaxDelete", lead("valid_max")),
    // Data transforms.
    data(
        "LatDirection",
        DataTransform::ReverseAxis {
            axis: "lat",
            bounds: "lat_bnds",
            bounds_dimension: "bnds",
        },
    ),
    data("ToDegC", DataTransform::KelvinToCelsius),
];

/// Look a fix up by name.
pub fn lookup(name: &str) -> Option<&'static FixDescriptor> {
    CATALOG.iter().find(|fix| fix.name == name)
}

/// Read-only view over the fix library.
#[derive(Debug, Clone, Copy)]
pub struct FixCatalog {
    fixes: &'static [FixDescriptor],
}

impl Default for FixCatalog {
    fn default() -> Self {
        Self { fixes: CATALOG }
    }
}

impl FixCatalog {
    #[cfg(test)]
    pub(crate) fn from_static(fixes: &'static [FixDescriptor]) -> Self {
        Self { fixes }
    }

    pub fn get(&self, name: &str) -> Option<&'static FixDescriptor> {
        self.fixes.iter().find(|fix| fix.name == name)
    }

    pub fn all(&self) -> &'static [FixDescriptor] {
        self.fixes
    }

    /// Resolve every name, or return the first unknown one.
    pub fn resolve(&self, names: &[String]) -> Result<Vec<&'static FixDescriptor>, String> {
        names
            .iter()
            .map(|name| self.get(name).ok_or_else(|| name.clone()))
            .collect()
    }
}
