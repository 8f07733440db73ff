pub fn generate_starter_config() -> String {
    r#"# =============================================================================
# RDSHARVEST CONFIGURATION
# =============================================================================
# Harvests rotated audit log files from one RDS instance into hour-partitioned
# S3 objects, tracking progress in a DynamoDB checkpoint table.
#
# Values may reference environment variables using the $env{...} syntax.
#
# Config file locations (in order of precedence):
#   1. Path specified via --config argument
#   2. ~/.config/rdsharvest/config.yml
#   3. /etc/rdsharvest/config.yml

# =============================================================================
# SOURCE
# =============================================================================
source:
  # RDS DB instance identifier to harvest from
  instance_identifier: $env{RDS_INSTANCE_IDENTIFIER}
  # Only log files whose name starts with this prefix are considered.
  # Rotated files carry a numeric suffix, e.g. audit/server_audit.log.3
  log_file_prefix: audit/server_audit.log
  # Log category; the checkpoint id is "<instance_identifier>:<category>"
  category: audit

# =============================================================================
# AWS
# =============================================================================
aws:
  region: $env{AWS_REGION}
  # endpoint: http://localhost:4566   # e.g. LocalStack
  # profile: default

# =============================================================================
# CHECKPOINT
# =============================================================================
# DynamoDB table with a string partition key named "id".
checkpoint:
  table_name: $env{DYNAMODB_TABLE_NAME}

# =============================================================================
# OUTPUT
# =============================================================================
# Records land at:
#   <prefix>/year=YYYY/month=MM/day=DD/hour=HH/<logfile_timestamp>.log
output:
  bucket: $env{S3_BUCKET_NAME}
  # Defaults to "<instance_identifier>/audit-logs"
  # prefix: my-instance/audit-logs

# =============================================================================
# HARVEST
# =============================================================================
harvest:
  # Shared retry budget for rotation races and body read failures
  max_retries: 5
  # Extra attempts when the filtered log file listing comes back empty
  listing_retries: 5
  # Pause before retrying after a failed body read
  read_retry_backoff: 1s
  download_timeout: 5m

# One of: error, warn, info, debug, trace
log_level: info
"#
    .to_string()
}
