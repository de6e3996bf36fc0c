use tplus_application::config::Config;
use tplus_domain::repositories::artifacts::{ArtifactReader, ArtifactWriter};
use tplus_domain::repositories::market_data::MarketDataRepository;
use tplus_infrastructure::artifacts::{FilesystemArtifactReader, FilesystemArtifactWriter};
use tplus_infrastructure::market_data::CsvMarketDataRepository;

pub struct EngineDeps {
    pub market_data: Box<dyn MarketDataRepository>,
    pub artifacts: Box<dyn ArtifactWriter>,
}

pub struct ValidateDeps {
    pub market_data: Box<dyn MarketDataRepository>,
}

pub struct ReportingDeps {
    pub reader: Box<dyn ArtifactReader>,
    pub writer: Box<dyn ArtifactWriter>,
}

pub fn build_engine_deps(config: &Config) -> EngineDeps {
    EngineDeps {
        market_data: build_market_data_repo(config),
        artifacts: Box::new(FilesystemArtifactWriter::new()),
    }
}

pub fn build_validate_deps(config: &Config) -> ValidateDeps {
    ValidateDeps {
        market_data: build_market_data_repo(config),
    }
}

pub fn build_reporting_deps() -> ReportingDeps {
    ReportingDeps {
        reader: Box::new(FilesystemArtifactReader::new()),
        writer: Box::new(FilesystemArtifactWriter::new()),
    }
}

fn build_market_data_repo(config: &Config) -> Box<dyn MarketDataRepository> {
    Box::new(CsvMarketDataRepository::new(config.data_dir()))
}
