use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_sagemaker::error::DisplayErrorContext;
use aws_sdk_sagemaker::types::{
    AlgorithmSpecification, AppSpecification, Channel, DataSource, OutputDataConfig,
    ProcessingClusterConfig, ProcessingInput, ProcessingInstanceType, ProcessingOutput,
    ProcessingOutputConfig, ProcessingResources, ProcessingS3DataType, ProcessingS3Input,
    ProcessingS3InputMode, ProcessingS3Output, ProcessingS3UploadMode, ResourceConfig,
    S3DataDistribution, S3DataSource, S3DataType, StoppingCondition, TrainingInputMode,
    TrainingInstanceType,
};
use tracing::info;

use crate::config::Config;
use crate::errors::AppError;
use crate::jobs::requests::{InputChannel, ProcessingJobRequest, TrainingJobRequest};
use crate::jobs::ComputeJobService;

/// `ComputeJobService` backed by Amazon SageMaker.
#[derive(Clone)]
pub struct SageMakerJobService {
    client: aws_sdk_sagemaker::Client,
}

impl SageMakerJobService {
    pub fn new(client: aws_sdk_sagemaker::Client) -> Self {
        Self { client }
    }

    pub async fn from_config(config: &Config) -> Self {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.aws_region.clone()))
            .load()
            .await;
        Self::new(aws_sdk_sagemaker::Client::new(&sdk_config))
    }
}

fn processing_input(req: &ProcessingJobRequest) -> ProcessingInput {
    let s3_input = ProcessingS3Input::builder()
        .s3_uri(&req.input_s3_uri)
        .local_path(&req.input_local_path)
        .s3_data_type(ProcessingS3DataType::S3Prefix)
        .s3_input_mode(ProcessingS3InputMode::File)
        .build();
    ProcessingInput::builder()
        .input_name("input")
        .s3_input(s3_input)
        .build()
}

fn processing_output(req: &ProcessingJobRequest) -> ProcessingOutputConfig {
    let s3_output = ProcessingS3Output::builder()
        .s3_uri(&req.output_s3_uri)
        .local_path(&req.output_local_path)
        .s3_upload_mode(ProcessingS3UploadMode::EndOfJob)
        .build();
    let output = ProcessingOutput::builder()
        .output_name("output")
        .s3_output(s3_output)
        .build();
    ProcessingOutputConfig::builder()
        .outputs(output)
        .build()
}

fn training_channel(channel: &InputChannel) -> Channel {
    let s3_source = S3DataSource::builder()
        .s3_data_type(S3DataType::S3Prefix)
        .s3_uri(&channel.s3_uri)
        .s3_data_distribution_type(S3DataDistribution::FullyReplicated)
        .build();
    Channel::builder()
        .channel_name(&channel.name)
        .data_source(DataSource::builder().s3_data_source(s3_source).build())
        .build()
}

fn missing_arn(operation: &str, job_name: &str) -> AppError {
    AppError::ComputeJob(format!("{operation} {job_name} returned no job ARN"))
}

#[async_trait]
impl ComputeJobService for SageMakerJobService {
    async fn submit_processing_job(&self, req: &ProcessingJobRequest) -> Result<String, AppError> {
        let mut app = AppSpecification::builder().image_uri(&req.image_uri);
        for arg in &req.entrypoint {
            app = app.container_entrypoint(arg);
        }
        let cluster = ProcessingClusterConfig::builder()
            .instance_count(req.instance_count)
            .instance_type(ProcessingInstanceType::from(req.instance_type.as_str()))
            .volume_size_in_gb(req.volume_size_gb)
            .build();
        let resources = ProcessingResources::builder()
            .cluster_config(cluster)
            .build();

        let mut call = self
            .client
            .create_processing_job()
            .processing_job_name(&req.job_name)
            .role_arn(&req.role_arn)
            .app_specification(app.build())
            .processing_resources(resources)
            .processing_inputs(processing_input(req))
            .processing_output_config(processing_output(req));
        for (key, value) in &req.environment {
            call = call.environment(key, value);
        }

        let output = call.send().await.map_err(|e| {
            AppError::ComputeJob(format!(
                "CreateProcessingJob {} failed: {}",
                req.job_name,
                DisplayErrorContext(&e)
            ))
        })?;

        let arn = output
            .processing_job_arn()
            .map(str::to_string)
            .ok_or_else(|| missing_arn("CreateProcessingJob", &req.job_name))?;
        info!(job = %req.job_name, arn = %arn, "Processing job submitted");
        Ok(arn)
    }

    async fn submit_training_job(&self, req: &TrainingJobRequest) -> Result<String, AppError> {
        let algorithm = AlgorithmSpecification::builder()
            .training_image(&req.image_uri)
            .training_input_mode(TrainingInputMode::File)
            .build();
        let resources = ResourceConfig::builder()
            .instance_type(TrainingInstanceType::from(req.instance_type.as_str()))
            .instance_count(req.instance_count)
            .volume_size_in_gb(req.volume_size_gb)
            .build();
        let output_config = OutputDataConfig::builder()
            .s3_output_path(&req.output_s3_uri)
            .build();

        let mut call = self
            .client
            .create_training_job()
            .training_job_name(&req.job_name)
            .role_arn(&req.role_arn)
            .algorithm_specification(algorithm)
            .resource_config(resources)
            .output_data_config(output_config)
            .stopping_condition(
                StoppingCondition::builder()
                    .max_runtime_in_seconds(req.max_runtime_secs)
                    .build(),
            );
        for channel in &req.channels {
            call = call.input_data_config(training_channel(channel));
        }
        for (key, value) in &req.hyperparameters {
            call = call.hyper_parameters(key, value);
        }
        for (key, value) in &req.environment {
            call = call.environment(key, value);
        }

        let output = call.send().await.map_err(|e| {
            AppError::ComputeJob(format!(
                "CreateTrainingJob {} failed: {}",
                req.job_name,
                DisplayErrorContext(&e)
            ))
        })?;

        let arn = output
            .training_job_arn()
            .map(str::to_string)
            .ok_or_else(|| missing_arn("CreateTrainingJob", &req.job_name))?;
        info!(job = %req.job_name, arn = %arn, "Training job submitted");
        Ok(arn)
    }
}
